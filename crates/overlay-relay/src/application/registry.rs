//! Subscription registry: the set of live sessions.
//!
//! The registry mutex protects membership bookkeeping only.  It is never held
//! across a send, a receive, an encode, or an `.await`:
//!
//! - [`Registry::add`] / [`Registry::remove`] touch the map and nothing else.
//! - [`Registry::snapshot_into`] copies `Arc`s of the matching sessions into a
//!   caller-owned buffer and releases the lock before the caller does any I/O.
//! - [`Registry::close_all`] collects the sessions first and removes them one
//!   at a time afterwards.  It also closes the registry: a session that
//!   finishes its handshake after shutdown began is refused by
//!   [`Registry::add`].
//!
//! `parking_lot::Mutex` is used because the critical sections are tiny and
//! never span an await point, and because it cannot be poisoned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use overlay_core::EventCategory;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::session::Session;

/// Returned by [`Registry::add`] once [`Registry::close_all`] has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("relay is shutting down; session refused")]
pub struct RegistryClosed;

/// Thread-safe set of active sessions keyed by session id.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
    /// Only written with `sessions` locked.
    closed: AtomicBool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session and returns the new total.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClosed`] after [`Registry::close_all`]; the session
    /// is not inserted.
    pub fn add(&self, session: Arc<Session>) -> Result<usize, RegistryClosed> {
        let (id, peer) = (session.id(), session.peer());
        let total = {
            let mut sessions = self.sessions.lock();
            if self.closed.load(Ordering::Relaxed) {
                return Err(RegistryClosed);
            }
            sessions.insert(id, session);
            sessions.len()
        };
        info!("subscriber {id} connected from {peer}; {total} connected");
        Ok(total)
    }

    /// Strikes a session from the registry and cancels both of its loops.
    ///
    /// Idempotent: only the first caller to move the session out of `Open`
    /// does any work or logs anything.  Returns `true` for that caller.
    pub fn remove(&self, session: &Session) -> bool {
        if !session.begin_close() {
            return false;
        }
        session.cancel();

        let remaining = {
            let mut sessions = self.sessions.lock();
            sessions.remove(&session.id());
            sessions.len()
        };
        session.mark_removed();

        info!(
            "subscriber {} ({}) disconnected; {remaining} connected",
            session.id(),
            session.peer()
        );
        true
    }

    /// Replaces the contents of `out` with every session subscribed to
    /// `category`.
    ///
    /// `out` is reserved to the full registry size so a reused buffer stops
    /// allocating once it has grown to the peak subscriber count.  The result
    /// is a point-in-time view: sessions added afterwards are missing, and
    /// sessions removed afterwards are still present and must tolerate a
    /// failed delivery.
    pub fn snapshot_into(&self, category: EventCategory, out: &mut Vec<Arc<Session>>) {
        out.clear();
        let sessions = self.sessions.lock();
        out.reserve(sessions.len());
        out.extend(
            sessions
                .values()
                .filter(|s| s.is_subscribed(category))
                .cloned(),
        );
    }

    /// Number of sessions subscribed to `category`.
    pub fn subscriber_count(&self, category: EventCategory) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|s| s.is_subscribed(category))
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forces every session through `Closing → Removed` and refuses new
    /// ones from now on.  Returns how many were closed by this call.
    pub fn close_all(&self) -> usize {
        let all: Vec<Arc<Session>> = {
            let sessions = self.sessions.lock();
            self.closed.store(true, Ordering::Relaxed);
            sessions.values().cloned().collect()
        };
        all.iter().filter(|s| self.remove(s)).count()
    }

}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::SessionState;

    fn open_session() -> Arc<Session> {
        let (session, _rx) = Session::new("127.0.0.1:40000".parse().unwrap(), 8);
        session
    }

    #[test]
    fn test_add_and_len() {
        let registry = Registry::new();
        assert!(registry.is_empty());

        assert_eq!(registry.add(open_session()), Ok(1));
        assert_eq!(registry.add(open_session()), Ok(2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        // Arrange
        let registry = Registry::new();
        let session = open_session();
        registry.add(Arc::clone(&session)).unwrap();

        // Act
        let first = registry.remove(&session);
        let second = registry.remove(&session);

        // Assert
        assert!(first);
        assert!(!second);
        assert!(registry.is_empty());
        assert_eq!(session.state(), SessionState::Removed);
        assert!(session.cancellation().is_cancelled());
    }

    #[test]
    fn test_remove_from_many_threads_wins_once() {
        let registry = Arc::new(Registry::new());
        let session = open_session();
        registry.add(Arc::clone(&session)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let session = Arc::clone(&session);
                std::thread::spawn(move || registry.remove(&session))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_filters_by_category() {
        // Arrange
        let registry = Registry::new();
        let keyboard = open_session();
        keyboard.subscribe(EventCategory::KEYBOARD);
        let mouse = open_session();
        mouse.subscribe(EventCategory::MOUSE_BUTTONS);
        let both = open_session();
        both.subscribe(EventCategory::KEYBOARD | EventCategory::MOUSE_BUTTONS);
        let idle = open_session();
        for s in [&keyboard, &mouse, &both, &idle] {
            registry.add(Arc::clone(s)).unwrap();
        }

        // Act
        let mut out = Vec::new();
        registry.snapshot_into(EventCategory::KEYBOARD, &mut out);

        // Assert
        let mut ids: Vec<Uuid> = out.iter().map(|s| s.id()).collect();
        ids.sort();
        let mut expected = vec![keyboard.id(), both.id()];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_snapshot_reuses_buffer() {
        let registry = Registry::new();
        for _ in 0..4 {
            let s = open_session();
            s.subscribe(EventCategory::DEVICES);
            registry.add(s).unwrap();
        }

        let mut out = Vec::new();
        registry.snapshot_into(EventCategory::DEVICES, &mut out);
        let capacity = out.capacity();
        registry.snapshot_into(EventCategory::KEYBOARD, &mut out);

        assert!(out.is_empty());
        assert_eq!(out.capacity(), capacity);
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let registry = Registry::new();
        let early = open_session();
        early.subscribe(EventCategory::KEYBOARD);
        registry.add(Arc::clone(&early)).unwrap();

        let mut out = Vec::new();
        registry.snapshot_into(EventCategory::KEYBOARD, &mut out);

        let late = open_session();
        late.subscribe(EventCategory::KEYBOARD);
        registry.add(late).unwrap();
        registry.remove(&early);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), early.id());
    }

    #[test]
    fn test_subscriber_count() {
        let registry = Registry::new();
        let s = open_session();
        registry.add(Arc::clone(&s)).unwrap();
        assert_eq!(registry.subscriber_count(EventCategory::KEYBOARD), 0);

        s.subscribe(EventCategory::KEYBOARD);
        assert_eq!(registry.subscriber_count(EventCategory::KEYBOARD), 1);
    }

    #[test]
    fn test_close_all_removes_everything_once() {
        let registry = Registry::new();
        let sessions: Vec<_> = (0..3).map(|_| open_session()).collect();
        for s in &sessions {
            registry.add(Arc::clone(s)).unwrap();
        }
        registry.remove(&sessions[0]);

        assert_eq!(registry.close_all(), 2);
        assert!(registry.is_empty());
        assert!(sessions.iter().all(|s| s.state() == SessionState::Removed));
    }

    #[test]
    fn test_add_after_close_all_is_refused() {
        // Arrange
        let registry = Registry::new();
        registry.add(open_session()).unwrap();
        registry.close_all();

        // Act
        let late = open_session();
        let result = registry.add(Arc::clone(&late));

        // Assert
        assert_eq!(result, Err(RegistryClosed));
        assert!(registry.is_empty());
        assert_eq!(late.state(), SessionState::Open);
    }
}
