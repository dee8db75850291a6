use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;
use crate::pattern::pattern::{BassPattern, DrumPattern, Voice};
use crate::scale::scale::{parse_key, ScaleType};

/// Commands sent from the control surface to the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    // Playback
    Start,
    Stop,
    Status,
    SetTempo(u32),

    // Instruments
    ToggleVoice(Voice),
    SetVoiceEnabled(Voice, bool),
    SetIntensity(Voice, f64),

    // Musical
    SetKey(u8),
    SetScale(ScaleType),
    SetPattern(Voice, String),

    // Other
    Help,
    Quit,
}

/// Input the control surface could not turn into a command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (type 'help')")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

const USAGE_BPM: &str = "bpm <60-200>";
const USAGE_VOICE: &str = "<toggle|enable|disable> <drum|bass|melody>";
const USAGE_INTENSITY: &str = "intensity <drum|bass|melody> <0.0-1.0>";
const USAGE_KEY: &str = "key <C..B | 0-11>";
const USAGE_SCALE: &str = "scale <major|minor|pentatonic|blues | 0-3>";
const USAGE_PATTERN: &str = "pattern <drum|bass|melody> <basic|breaks|acid|sparse>";

/// Help text listing every control-surface command.
pub const HELP: &str = "\
PLAYBACK:
  start                          Start the jam
  stop                           Stop the jam
  status                         Show status
  bpm <60-200>                   Change BPM
INSTRUMENTS:
  toggle <drum|bass|melody>      Toggle a voice
  enable|disable <voice>         Switch a voice on or off
  intensity <voice> <0.0-1.0>    Adjust a voice's intensity
MUSICAL:
  key <C..B | 0-11>              Change key
  scale <name | 0-3>             Major, Minor, Pentatonic, Blues
  pattern drum <basic|breaks>    Change drum pattern
  pattern bass <basic|acid>      Change bass pattern
OTHER:
  help                           Show this help
  quit                           Stop and exit";

impl FromStr for SessionCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError::Empty);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("start" | "play", []) => Self::Start,
            ("stop", []) => Self::Stop,
            ("status", []) => Self::Status,
            ("bpm" | "tempo", [bpm]) => Self::SetTempo(
                bpm.parse()
                    .map_err(|_| CommandError::Usage(USAGE_BPM))?,
            ),
            ("bpm" | "tempo", _) => return Err(CommandError::Usage(USAGE_BPM)),
            ("toggle", [voice]) => Self::ToggleVoice(voice.parse()?),
            ("enable", [voice]) => Self::SetVoiceEnabled(voice.parse()?, true),
            ("disable", [voice]) => Self::SetVoiceEnabled(voice.parse()?, false),
            ("toggle" | "enable" | "disable", _) => return Err(CommandError::Usage(USAGE_VOICE)),
            ("intensity", [voice, value]) => Self::SetIntensity(
                voice.parse()?,
                value
                    .parse()
                    .map_err(|_| CommandError::Usage(USAGE_INTENSITY))?,
            ),
            ("intensity", _) => return Err(CommandError::Usage(USAGE_INTENSITY)),
            ("key", [key]) => Self::SetKey(parse_key(key)?),
            ("key", _) => return Err(CommandError::Usage(USAGE_KEY)),
            ("scale", [scale]) => Self::SetScale(scale.parse()?),
            ("scale", _) => return Err(CommandError::Usage(USAGE_SCALE)),
            ("pattern", [voice, name]) => {
                let voice: Voice = voice.parse()?;
                // Validate early so typos are reported before reaching the session
                match voice {
                    Voice::Drum => {
                        name.parse::<DrumPattern>()?;
                    }
                    Voice::Bass => {
                        name.parse::<BassPattern>()?;
                    }
                    Voice::Melody => {}
                }
                Self::SetPattern(voice, name.to_string())
            }
            ("pattern", _) => return Err(CommandError::Usage(USAGE_PATTERN)),
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit" | "q", _) => Self::Quit,
            (other, _) => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// Startup defaults persisted in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // MIDI settings
    pub midi_port: String,
    pub virtual_port_name: String,
    pub create_virtual_port: bool,

    // Session defaults
    pub bpm: u32,
    pub key_root: u8,
    pub scale: ScaleType,
    pub drum_pattern: DrumPattern,
    pub bass_pattern: BassPattern,
    pub drum_intensity: f64,
    pub bass_intensity: f64,
    pub melody_intensity: f64,

    // Pattern randomness; None draws a fresh seed every run
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // MIDI defaults
            midi_port: "Python".to_string(),
            virtual_port_name: "Python to Ableton".to_string(),
            create_virtual_port: true,

            // Session defaults
            bpm: 128,
            key_root: 0,
            scale: ScaleType::Major,
            drum_pattern: DrumPattern::Basic,
            bass_pattern: BassPattern::Basic,
            drum_intensity: 1.0,
            bass_intensity: 0.8,
            melody_intensity: 0.3,

            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_playback() {
        assert_eq!("start".parse(), Ok(SessionCommand::Start));
        assert_eq!("  STOP ".parse(), Ok(SessionCommand::Stop));
        assert_eq!("bpm 140".parse(), Ok(SessionCommand::SetTempo(140)));
        // Range is checked by the session, not the parser
        assert_eq!("bpm 59".parse(), Ok(SessionCommand::SetTempo(59)));
        assert_eq!(
            "bpm fast".parse::<SessionCommand>(),
            Err(CommandError::Usage(USAGE_BPM))
        );
    }

    #[test]
    fn test_parse_instruments() {
        assert_eq!(
            "toggle drums".parse(),
            Ok(SessionCommand::ToggleVoice(Voice::Drum))
        );
        assert_eq!(
            "disable melody".parse(),
            Ok(SessionCommand::SetVoiceEnabled(Voice::Melody, false))
        );
        assert_eq!(
            "intensity bass 0.5".parse(),
            Ok(SessionCommand::SetIntensity(Voice::Bass, 0.5))
        );
        assert!(matches!(
            "toggle cowbell".parse::<SessionCommand>(),
            Err(CommandError::Invalid(ValidationError::UnknownVoice(_)))
        ));
    }

    #[test]
    fn test_parse_musical() {
        assert_eq!("key F#".parse(), Ok(SessionCommand::SetKey(6)));
        assert_eq!("key 2".parse(), Ok(SessionCommand::SetKey(2)));
        assert_eq!(
            "scale pentatonic".parse(),
            Ok(SessionCommand::SetScale(ScaleType::Pentatonic))
        );
        assert_eq!(
            "pattern drum breaks".parse(),
            Ok(SessionCommand::SetPattern(Voice::Drum, "breaks".to_string()))
        );
        assert!(matches!(
            "pattern bass breaks".parse::<SessionCommand>(),
            Err(CommandError::Invalid(ValidationError::UnknownPattern { .. }))
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<SessionCommand>(), Err(CommandError::Empty));
        assert_eq!(
            "dance".parse::<SessionCommand>(),
            Err(CommandError::Unknown("dance".to_string()))
        );
        assert_eq!(
            "key".parse::<SessionCommand>(),
            Err(CommandError::Usage(USAGE_KEY))
        );
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut settings = Settings::default();
        settings.seed = Some(42);
        settings.scale = ScaleType::Minor;
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);

        // Missing fields fall back to defaults
        let partial: Settings = serde_json::from_str(r#"{"bpm": 90}"#).unwrap();
        assert_eq!(partial.bpm, 90);
        assert_eq!(partial.midi_port, "Python");
    }
}
