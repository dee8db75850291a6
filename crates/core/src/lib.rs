pub use clock::beat_clock::{BeatClock, ClockState, LoopState, BARS_PER_LOOP, BEATS_PER_BAR};
pub use config::{ConfigError, ConfigManager, ConfigSchema};
pub use error::{PortError, SessionError, TransportError, ValidationError};
pub use messages::{CommandError, SessionCommand, Settings, HELP};
pub use midi::midi::{MidiMessage, BASS_CHANNEL, DRUM_CHANNEL, MELODY_CHANNEL};
// Output backends
pub use output::{
    list_output_ports, CaptureOutput, CapturedMessage, LogOutput, MidiPortOutput, NoteOutput,
};
pub use pattern::pattern::{
    BassPattern, DrumPattern, DrumSound, PatternGenerator, TriggerRequest, Voice,
};
pub use scale::scale::{key_name, parse_key, pitches, Scale, ScaleType, BASE_PITCH, KEY_NAMES};
pub use scheduler::note_scheduler::NoteScheduler;
pub use session::session::{
    SessionController, SessionParameters, SessionStatus, VoiceSettings, MAX_BPM, MIN_BPM,
};

mod clock;
mod config;
mod error;
pub mod messages;
mod midi;
pub mod output;
pub mod pattern;
mod scale;
mod scheduler;
mod session;
