use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::time::Instant;

use super::traits::NoteOutput;
use crate::error::TransportError;
use crate::midi::midi::MidiMessage;

/// A message as it reached the output, stamped with the Tokio clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedMessage {
    pub at: Instant,
    pub message: MidiMessage,
}

/// In-memory output that records everything it is sent.
///
/// Can be switched into a failing mode to exercise transport error paths.
/// Failed sends are not recorded.
#[derive(Default)]
pub struct CaptureOutput {
    messages: Mutex<Vec<CapturedMessage>>,
    failing: AtomicBool,
}

impl CaptureOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<CapturedMessage> {
        self.messages.lock().clone()
    }

    pub fn note_ons(&self) -> Vec<CapturedMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.message.is_note_on())
            .copied()
            .collect()
    }

    pub fn note_offs(&self) -> Vec<CapturedMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| !m.message.is_note_on())
            .copied()
            .collect()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl NoteOutput for CaptureOutput {
    fn name(&self) -> &str {
        "capture"
    }

    fn send(&self, message: MidiMessage) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Send {
                port: self.name().to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        self.messages.lock().push(CapturedMessage {
            at: Instant::now(),
            message,
        });
        Ok(())
    }
}
