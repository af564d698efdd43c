//! Newline-delimited JSON input source.
//!
//! Lets any external capture helper feed the relay through a pipe: one JSON
//! record per line on standard input (or any other reader).
//!
//! ```text
//! {"kind":"key","button":"A","pressed":true,"held":false,"makecode":30,"flags":0,"vkey":65}
//! {"kind":"key","pressed":true,"makecode":42,"flags":0,"vkey":16}
//! {"kind":"click","button":"Mouse1","pressed":true}
//! {"kind":"wheel","button":"MouseWheelUp","count":3}
//! {"kind":"device","handle":"0x0000000000010043","device":"Keyboard","attached":true}
//! ```
//!
//! A `key` record without `button` is resolved from its raw Windows
//! virtual-key triple.  Blank lines and lines starting with `#` are skipped.
//! Malformed lines are logged and skipped; end of input ends the source.
//!
//! The reader runs on a dedicated OS thread because standard input has no
//! portable async API.  A thread blocked in `read` cannot be interrupted, so
//! [`InputSource::stop`] only takes effect at the next line or at EOF.

use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use overlay_core::keymap::button_from_raw;
use overlay_core::{
    ButtonEvent, Device, DeviceEvent, DeviceHandle, DeviceKind, InputEvent, KeyboardButton,
    MouseButton, RawKeyboard,
};
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{CaptureError, InputSource};
use crate::application::{EventSink, SubmitError};

/// Why one input line was rejected.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("virtual key {vkey:#04x} does not map to a known button")]
    UnmappedKey { vkey: u16 },
}

/// One line of input.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum InputRecord {
    Key {
        #[serde(default)]
        button: Option<KeyboardButton>,
        pressed: bool,
        #[serde(default)]
        held: bool,
        #[serde(default)]
        makecode: u16,
        #[serde(default)]
        flags: u16,
        #[serde(default)]
        vkey: u16,
    },
    Click {
        button: MouseButton,
        pressed: bool,
    },
    Wheel {
        button: MouseButton,
        count: i32,
    },
    Device {
        handle: String,
        device: DeviceKind,
        attached: bool,
    },
}

impl InputRecord {
    fn into_event(self) -> Result<InputEvent, RecordError> {
        Ok(match self {
            InputRecord::Key {
                button,
                pressed,
                held,
                makecode,
                flags,
                vkey,
            } => {
                let raw = RawKeyboard {
                    makecode,
                    flags,
                    vkey,
                };
                let button = match button {
                    Some(b) => b,
                    None => match button_from_raw(raw) {
                        b if b.is_none() => return Err(RecordError::UnmappedKey { vkey }),
                        b => b,
                    },
                };
                ButtonEvent::key(button, raw, pressed, held).into()
            }
            InputRecord::Click { button, pressed } => ButtonEvent::click(button, pressed).into(),
            InputRecord::Wheel { button, count } => ButtonEvent::wheel(button, count).into(),
            InputRecord::Device {
                handle,
                device,
                attached,
            } => DeviceEvent {
                device: Device {
                    handle: DeviceHandle::new(handle),
                    kind: device,
                },
                attached,
            }
            .into(),
        })
    }
}

/// Parses one line into an event.
///
/// # Errors
///
/// Returns a [`RecordError`] for malformed JSON, unknown names, or a raw key
/// that maps to no button.
pub fn parse_line(line: &str) -> Result<InputEvent, RecordError> {
    serde_json::from_str::<InputRecord>(line)?.into_event()
}

type BoxedReader = Box<dyn BufRead + Send>;

/// Reads event records from a line-oriented reader on its own thread.
pub struct LineInputSource {
    reader: Mutex<Option<BoxedReader>>,
    stopped: Arc<AtomicBool>,
}

impl LineInputSource {
    pub fn new(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A source reading from the process's standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }
}

impl InputSource for LineInputSource {
    fn start(&self, sink: EventSink) -> Result<(), CaptureError> {
        let reader = self.reader.lock().take().ok_or(CaptureError::AlreadyStarted)?;
        let stopped = Arc::clone(&self.stopped);
        thread::Builder::new()
            .name("line-input".to_string())
            .spawn(move || read_lines(reader, &sink, &stopped))?;
        info!("reading input events from line source");
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}

/// Reader thread body.  Returns the number of events submitted.
fn read_lines(reader: impl BufRead, sink: &EventSink, stopped: &AtomicBool) -> usize {
    let mut submitted = 0;
    for (index, line) in reader.lines().enumerate() {
        if stopped.load(Ordering::Relaxed) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("input read failed: {e}");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_line(trimmed) {
            Ok(evt) => match sink.submit(evt) {
                Ok(()) => submitted += 1,
                Err(SubmitError::Full) => {}
                Err(SubmitError::Closed) => break,
            },
            Err(e) => warn!("input line {}: {e}", index + 1),
        }
    }
    debug!("line input source finished after {submitted} event(s)");
    submitted
}

// ── Tests ─────────────────────────────────────────────────────────────────────
