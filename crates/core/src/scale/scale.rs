use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Pitch of key root 0 (C4). Every scale is built upward from here.
pub const BASE_PITCH: u8 = 60;

/// Display names for key roots 0-11.
pub const KEY_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Flat spellings accepted when parsing a key.
const FLAT_ALIASES: [(&str, u8); 5] = [("DB", 1), ("EB", 3), ("GB", 6), ("AB", 8), ("BB", 10)];

/// Scale families the pattern generators can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleType {
    #[default]
    Major,
    Minor,
    Pentatonic,
    Blues,
}

impl ScaleType {
    pub const ALL: [ScaleType; 4] = [Self::Major, Self::Minor, Self::Pentatonic, Self::Blues];

    /// Semitone offsets from the root, ascending.
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Pentatonic => &[0, 2, 4, 7, 9],
            Self::Blues => &[0, 2, 3, 6, 7, 8, 11],
        }
    }

    /// Get a display name for the scale.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::Minor => "Minor",
            Self::Pentatonic => "Pentatonic",
            Self::Blues => "Blues",
        }
    }

    /// Get the scale from its menu index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl std::fmt::Display for ScaleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for ScaleType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(index) = trimmed.parse::<usize>() {
            return Self::from_index(index)
                .ok_or_else(|| ValidationError::UnknownScale(trimmed.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|scale| scale.display_name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::UnknownScale(trimmed.to_string()))
    }
}

/// An immutable, ascending set of absolute pitches for one key and scale type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale {
    key_root: u8,
    scale_type: ScaleType,
    pitches: Vec<u8>,
}

impl Scale {
    /// Build the scale for `key_root` (0-11). Out-of-range roots are a caller bug.
    pub fn new(key_root: u8, scale_type: ScaleType) -> Self {
        debug_assert!(key_root < 12, "key root {key_root} out of range");
        Self {
            key_root,
            scale_type,
            pitches: pitches(key_root, scale_type),
        }
    }

    pub fn key_root(&self) -> u8 {
        self.key_root
    }

    pub fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    /// Absolute pitch of the root note.
    pub fn root_pitch(&self) -> u8 {
        BASE_PITCH + self.key_root
    }

    pub fn pitches(&self) -> &[u8] {
        &self.pitches
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    /// Pitch of a scale degree, wrapping past the top of the scale.
    pub fn degree(&self, index: usize) -> u8 {
        self.pitches[index % self.pitches.len()]
    }
}

/// Absolute pitches of `scale_type` rooted at `BASE_PITCH + key_root`.
pub fn pitches(key_root: u8, scale_type: ScaleType) -> Vec<u8> {
    let root = BASE_PITCH + key_root;
    scale_type
        .intervals()
        .iter()
        .map(|interval| root + interval)
        .collect()
}

/// Display name for a key root, e.g. `3` -> `"D#"`.
pub fn key_name(key_root: u8) -> &'static str {
    KEY_NAMES.get(key_root as usize).copied().unwrap_or("?")
}

/// Parse a key from its index ("0"-"11") or name ("C#", "eb", ...).
pub fn parse_key(s: &str) -> Result<u8, ValidationError> {
    let trimmed = s.trim();
    if let Ok(index) = trimmed.parse::<u8>() {
        return if index < 12 {
            Ok(index)
        } else {
            Err(ValidationError::KeyRoot(index))
        };
    }

    let upper = trimmed.to_ascii_uppercase();
    KEY_NAMES
        .iter()
        .position(|name| *name == upper)
        .map(|index| index as u8)
        .or_else(|| {
            FLAT_ALIASES
                .iter()
                .find(|(alias, _)| *alias == upper)
                .map(|(_, index)| *index)
        })
        .ok_or_else(|| ValidationError::UnknownKey(trimmed.to_string()))
}
