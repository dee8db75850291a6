use super::traits::NoteOutput;
use crate::error::TransportError;
use crate::midi::midi::MidiMessage;

/// Dry-run output: every event goes to the log instead of a port.
pub struct LogOutput {
    name: String,
}

impl LogOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogOutput {
    fn default() -> Self {
        Self::new("dry-run")
    }
}

impl NoteOutput for LogOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: MidiMessage) -> Result<(), TransportError> {
        log::info!("[{}] {}", self.name, message);
        Ok(())
    }
}
