//! Heartbeat nonce generator.
//!
//! Every session's heartbeat loop draws from one shared generator, so the RNG
//! sits behind its own mutex.  Nonces fit the signed 32-bit range and are
//! never negative (the session uses `-1` as its "nothing outstanding" marker).

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug)]
pub struct NonceSource {
    rng: Mutex<StdRng>,
}

impl NonceSource {
    /// A generator seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// A deterministic generator, for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Draws the next nonce in `0..=i32::MAX`.
    pub fn next_nonce(&self) -> i64 {
        self.rng.lock().gen_range(0..=i64::from(i32::MAX))
    }
}

impl Default for NonceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_nonces_are_in_range() {
        let source = NonceSource::new();
        for _ in 0..1000 {
            let n = source.next_nonce();
            assert!((0..=i64::from(i32::MAX)).contains(&n));
        }
    }

    #[test]
    fn test_same_seed_gives_same_sequence() {
        let a = NonceSource::seeded(42);
        let b = NonceSource::seeded(42);
        let seq_a: Vec<i64> = (0..5).map(|_| a.next_nonce()).collect();
        let seq_b: Vec<i64> = (0..5).map(|_| b.next_nonce()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_shared_across_threads() {
        let source = Arc::new(NonceSource::seeded(7));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let source = Arc::clone(&source);
                std::thread::spawn(move || (0..100).map(|_| source.next_nonce()).count())
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 400);
    }
}
