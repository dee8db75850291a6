pub mod capture_output;
pub mod log_output;
pub mod midi_output;
pub mod traits;

// Re-export for convenience
pub use capture_output::{CaptureOutput, CapturedMessage};
pub use log_output::LogOutput;
pub use midi_output::{list_output_ports, MidiPortOutput};
pub use traits::NoteOutput;
