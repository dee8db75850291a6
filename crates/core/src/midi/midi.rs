/// Wire channels (0-indexed). The drum channel is General MIDI percussion ("channel 10").
pub const DRUM_CHANNEL: u8 = 9;
pub const BASS_CHANNEL: u8 = 1;
pub const MELODY_CHANNEL: u8 = 2;

const NOTE_OFF_STATUS: u8 = 0x80;
const NOTE_ON_STATUS: u8 = 0x90;

// MIDI message types we emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 }, // always sent with velocity 0
}

impl MidiMessage {
    pub fn channel(&self) -> u8 {
        match self {
            Self::NoteOn { channel, .. } | Self::NoteOff { channel, .. } => *channel,
        }
    }

    pub fn note(&self) -> u8 {
        match self {
            Self::NoteOn { note, .. } | Self::NoteOff { note, .. } => *note,
        }
    }

    pub fn velocity(&self) -> u8 {
        match self {
            Self::NoteOn { velocity, .. } => *velocity,
            Self::NoteOff { .. } => 0,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, Self::NoteOn { .. })
    }

    /// Raw three-byte encoding for a MIDI port.
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => [
                NOTE_ON_STATUS | (channel & 0x0F),
                note & 0x7F,
                velocity & 0x7F,
            ],
            Self::NoteOff { channel, note } => [NOTE_OFF_STATUS | (channel & 0x0F), note & 0x7F, 0],
        }
    }
}

impl std::fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => write!(f, "note on  ch {:>2} note {:>3} vel {:>3}", channel, note, velocity),
            Self::NoteOff { channel, note } => {
                write!(f, "note off ch {:>2} note {:>3}", channel, note)
            }
        }
    }
}
