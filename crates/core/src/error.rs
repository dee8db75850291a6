use thiserror::Error;

use crate::pattern::pattern::Voice;
use crate::session::session::{MAX_BPM, MIN_BPM};

/// Rejected parameter input. The parameter it targeted is left unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("tempo {0} BPM is outside {min}-{max}", min = MIN_BPM, max = MAX_BPM)]
    Tempo(u32),

    #[error("key root {0} is outside 0-11")]
    KeyRoot(u8),

    #[error("intensity for {0} must be a number between 0.0 and 1.0")]
    Intensity(Voice),

    #[error("unknown key '{0}'")]
    UnknownKey(String),

    #[error("unknown scale '{0}' (major, minor, pentatonic, blues)")]
    UnknownScale(String),

    #[error("unknown voice '{0}' (drum, bass, melody)")]
    UnknownVoice(String),

    #[error("unknown {voice} pattern '{name}'")]
    UnknownPattern { voice: Voice, name: String },
}

/// A note event could not be delivered to the output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to send MIDI to '{port}': {reason}")]
    Send { port: String, reason: String },

    #[error("note scheduler has been shut down")]
    Closed,
}

/// Output port discovery and connection failures.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("failed to initialise MIDI output: {0}")]
    Init(#[from] midir::InitError),

    #[error("no MIDI output port matching '{0}'")]
    NotFound(String),

    #[error("failed to connect to '{port}': {reason}")]
    Connect { port: String, reason: String },

    #[error("virtual MIDI ports are not supported on this platform")]
    VirtualUnsupported,
}

/// Errors surfaced by the session controller.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no MIDI output is bound to the session")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Port(#[from] PortError),
}
