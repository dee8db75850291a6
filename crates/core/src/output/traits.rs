use crate::error::TransportError;
use crate::midi::midi::MidiMessage;

/// Destination for note events: a MIDI port, a log, or a test capture.
///
/// `send` is called from the beat clock task and the note-off timer task, so
/// implementations must not block for long; a slow send stalls the beat.
pub trait NoteOutput: Send + Sync {
    /// Name shown in status output.
    fn name(&self) -> &str;

    fn send(&self, message: MidiMessage) -> Result<(), TransportError>;
}
