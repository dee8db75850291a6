//! Per-beat pattern decisions for the drum, bass and melody voices.
//!
//! Every function here is pure apart from the random source it is handed, so
//! a seeded generator replays the exact same performance.

use std::str::FromStr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::midi::midi::{BASS_CHANNEL, DRUM_CHANNEL, MELODY_CHANNEL};
use crate::scale::scale::Scale;
use crate::session::session::SessionParameters;

/// Semitones the bass sits below the scale.
const BASS_TRANSPOSE: u8 = 24;
/// Acid bass occasionally jumps a minor third.
const ACID_JUMP: u8 = 3;

const BASS_BASIC_DURATION: Duration = Duration::from_millis(700);
const BASS_ACID_DURATION: Duration = Duration::from_millis(300);
const MELODY_DURATION: Duration = Duration::from_millis(1500);

/// An independent instrument track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Drum,
    Bass,
    Melody,
}

impl Voice {
    pub const ALL: [Voice; 3] = [Self::Drum, Self::Bass, Self::Melody];

    /// Output channel for this voice.
    pub fn channel(&self) -> u8 {
        match self {
            Self::Drum => DRUM_CHANNEL,
            Self::Bass => BASS_CHANNEL,
            Self::Melody => MELODY_CHANNEL,
        }
    }

    /// Get a display name for the voice.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Drum => "Drums",
            Self::Bass => "Bass",
            Self::Melody => "Melody",
        }
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Drum => write!(f, "drum"),
            Self::Bass => write!(f, "bass"),
            Self::Melody => write!(f, "melody"),
        }
    }
}

impl FromStr for Voice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drum" | "drums" => Ok(Self::Drum),
            "bass" => Ok(Self::Bass),
            "melody" | "lead" => Ok(Self::Melody),
            other => Err(ValidationError::UnknownVoice(other.to_string())),
        }
    }
}

/// Drum pattern variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrumPattern {
    /// Four on the floor, snare on the backbeat.
    #[default]
    Basic,
    /// Breakbeat with probabilistic ghost kicks.
    Breaks,
}

impl DrumPattern {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Basic => "Basic 4/4",
            Self::Breaks => "Breakbeat",
        }
    }
}

impl FromStr for DrumPattern {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "0" => Ok(Self::Basic),
            "breaks" | "breakbeat" | "1" => Ok(Self::Breaks),
            other => Err(ValidationError::UnknownPattern {
                voice: Voice::Drum,
                name: other.to_string(),
            }),
        }
    }
}

/// Bass pattern variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BassPattern {
    /// Root movement on beats 1 and 3.
    #[default]
    Basic,
    /// Short random notes on every beat.
    Acid,
}

impl BassPattern {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Acid => "Acid",
        }
    }
}

impl FromStr for BassPattern {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "0" => Ok(Self::Basic),
            "acid" | "1" => Ok(Self::Acid),
            other => Err(ValidationError::UnknownPattern {
                voice: Voice::Bass,
                name: other.to_string(),
            }),
        }
    }
}

/// Drum kit pieces and their fixed General MIDI pitches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumSound {
    Kick,
    Snare,
    HiHat,
}

impl DrumSound {
    pub fn pitch(&self) -> u8 {
        match self {
            Self::Kick => 36,
            Self::Snare => 38,
            Self::HiHat => 42,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Kick | Self::Snare => Duration::from_millis(100),
            Self::HiHat => Duration::from_millis(50),
        }
    }

    pub fn velocity(&self, intensity: f64) -> u8 {
        match self {
            Self::Kick => velocity(100.0, 27.0, intensity),
            Self::Snare => velocity(90.0, 30.0, intensity),
            Self::HiHat => velocity(60.0, 30.0, intensity),
        }
    }

    fn trigger(&self, intensity: f64) -> TriggerRequest {
        TriggerRequest {
            voice: Voice::Drum,
            pitch: self.pitch(),
            velocity: self.velocity(intensity),
            duration: self.duration(),
        }
    }
}

/// A decision to sound one note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerRequest {
    pub voice: Voice,
    pub pitch: u8,
    pub velocity: u8,
    pub duration: Duration,
}

/// `base + span * intensity`, truncated into the MIDI velocity range.
pub fn velocity(base: f64, span: f64, intensity: f64) -> u8 {
    (base + span * intensity).clamp(0.0, 127.0) as u8
}

pub fn drum_basic(beat: u8, intensity: f64) -> Vec<TriggerRequest> {
    let mut triggers = vec![DrumSound::Kick.trigger(intensity)];
    if beat % 2 == 1 {
        triggers.push(DrumSound::Snare.trigger(intensity));
    }
    triggers
}

pub fn drum_breaks<R: Rng + ?Sized>(beat: u8, intensity: f64, rng: &mut R) -> Vec<TriggerRequest> {
    let mut triggers = Vec::new();
    match beat {
        0 => triggers.push(DrumSound::Kick.trigger(intensity)),
        1 => triggers.push(DrumSound::Snare.trigger(intensity)),
        2 => {
            if rng.random::<f64>() > 0.3 {
                triggers.push(DrumSound::Kick.trigger(intensity));
            }
        }
        3 => {
            triggers.push(DrumSound::Snare.trigger(intensity));
            if rng.random::<f64>() > 0.7 {
                triggers.push(DrumSound::Kick.trigger(intensity));
            }
        }
        _ => {}
    }
    triggers
}

/// Off-beat hat, appended after every other decision on the beat.
pub fn hihat(intensity: f64) -> TriggerRequest {
    DrumSound::HiHat.trigger(intensity)
}

pub fn bass_basic<R: Rng + ?Sized>(
    beat: u8,
    bar: u8,
    intensity: f64,
    scale: &Scale,
    rng: &mut R,
) -> Option<TriggerRequest> {
    if !(beat == 0 || beat == 2) || rng.random::<f64>() >= intensity {
        return None;
    }
    Some(TriggerRequest {
        voice: Voice::Bass,
        pitch: scale.degree(bar as usize) - BASS_TRANSPOSE,
        velocity: velocity(80.0, 30.0, intensity),
        duration: BASS_BASIC_DURATION,
    })
}

pub fn bass_acid<R: Rng + ?Sized>(
    intensity: f64,
    scale: &Scale,
    rng: &mut R,
) -> Option<TriggerRequest> {
    if rng.random::<f64>() >= intensity {
        return None;
    }
    let mut pitch = scale.degree(rng.random_range(0..scale.len())) - BASS_TRANSPOSE;
    if rng.random::<f64>() > 0.7 {
        pitch += ACID_JUMP;
    }
    Some(TriggerRequest {
        voice: Voice::Bass,
        pitch,
        velocity: velocity(80.0, 30.0, intensity),
        duration: BASS_ACID_DURATION,
    })
}

pub fn melody_sparse<R: Rng + ?Sized>(
    beat: u8,
    bar: u8,
    intensity: f64,
    scale: &Scale,
    rng: &mut R,
) -> Option<TriggerRequest> {
    if beat != 0 || bar % 4 != 0 || rng.random::<f64>() >= intensity {
        return None;
    }
    Some(TriggerRequest {
        voice: Voice::Melody,
        pitch: scale.degree(rng.random_range(0..scale.len())),
        velocity: velocity(70.0, 30.0, intensity),
        duration: MELODY_DURATION,
    })
}

/// Runs the selected pattern variants for one beat with an owned random source.
pub struct PatternGenerator<R = StdRng> {
    rng: R,
}

impl PatternGenerator<StdRng> {
    /// Reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> PatternGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Decide every trigger for `beat` (0-3) of `bar` (0-15), in the order
    /// drums, bass, melody, hi-hat.
    pub fn generate(&mut self, params: &SessionParameters, bar: u8, beat: u8) -> Vec<TriggerRequest> {
        let mut triggers = Vec::new();
        let scale = params.scale();

        if params.drum.enabled {
            let drums = match params.drum_pattern {
                DrumPattern::Basic => drum_basic(beat, params.drum.intensity),
                DrumPattern::Breaks => drum_breaks(beat, params.drum.intensity, &mut self.rng),
            };
            triggers.extend(drums);
        }

        if params.bass.enabled {
            let bass = match params.bass_pattern {
                BassPattern::Basic => {
                    bass_basic(beat, bar, params.bass.intensity, &scale, &mut self.rng)
                }
                BassPattern::Acid => bass_acid(params.bass.intensity, &scale, &mut self.rng),
            };
            triggers.extend(bass);
        }

        if params.melody.enabled {
            triggers.extend(melody_sparse(
                beat,
                bar,
                params.melody.intensity,
                &scale,
                &mut self.rng,
            ));
        }

        if params.drum.enabled {
            triggers.push(hihat(params.drum.intensity));
        }

        triggers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::scale::ScaleType;

    fn count_voice(triggers: &[TriggerRequest], voice: Voice) -> usize {
        triggers.iter().filter(|t| t.voice == voice).count()
    }

    #[test]
    fn test_drum_velocities() {
        assert_eq!(DrumSound::Kick.velocity(1.0), 127);
        assert_eq!(DrumSound::Kick.velocity(0.0), 100);
        assert_eq!(DrumSound::Snare.velocity(1.0), 120);
        assert_eq!(DrumSound::HiHat.velocity(0.5), 75);
        // 100 + 13.5 truncates
        assert_eq!(DrumSound::Kick.velocity(0.5), 113);
    }

    #[test]
    fn test_drum_basic_backbeat() {
        for beat in 0..4u8 {
            let triggers = drum_basic(beat, 1.0);
            assert_eq!(triggers[0].pitch, 36);
            let snares = triggers.iter().filter(|t| t.pitch == 38).count();
            assert_eq!(snares, if beat % 2 == 1 { 1 } else { 0 });
            assert!(triggers.iter().all(|t| t.duration == Duration::from_millis(100)));
        }
    }

    #[test]
    fn test_breaks_beat_one_is_single_snare() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let triggers = drum_breaks(1, 0.5, &mut rng);
            assert_eq!(triggers.len(), 1);
            assert_eq!(triggers[0].pitch, DrumSound::Snare.pitch());
        }
    }

    #[test]
    fn test_breaks_beat_three_always_snares_first() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut kicks = 0;
        for _ in 0..1000 {
            let triggers = drum_breaks(3, 1.0, &mut rng);
            assert_eq!(triggers[0].pitch, DrumSound::Snare.pitch());
            kicks += triggers.len() - 1;
        }
        // p = 0.3
        assert!((200..400).contains(&kicks), "kicks = {kicks}");
    }

    #[test]
    fn test_breaks_beat_two_kick_is_likely() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut kicks = 0;
        for _ in 0..1000 {
            let triggers = drum_breaks(2, 1.0, &mut rng);
            assert!(triggers.iter().all(|t| t.pitch == DrumSound::Kick.pitch()));
            kicks += triggers.len();
        }
        // p = 0.7
        assert!((600..800).contains(&kicks), "kicks = {kicks}");
    }

    #[test]
    fn test_acid_jump_rate() {
        // C pentatonic: only the jump from E lands back in the scale
        let scale = Scale::new(0, ScaleType::Pentatonic);
        let in_scale: Vec<u8> = scale.pitches().iter().map(|p| p - 24).collect();
        let mut rng = StdRng::seed_from_u64(17);
        let mut off_scale = 0;
        for _ in 0..2000 {
            let note = bass_acid(1.0, &scale, &mut rng).unwrap();
            if !in_scale.contains(&note.pitch) {
                assert!(in_scale.contains(&(note.pitch - 3)));
                off_scale += 1;
            }
        }
        // p = 0.3 * 4/5
        assert!((400..560).contains(&off_scale), "off scale = {off_scale}");
    }

    #[test]
    fn test_bass_basic_follows_bar() {
        let scale = Scale::new(0, ScaleType::Major);
        let mut rng = StdRng::seed_from_u64(1);
        let note = bass_basic(0, 2, 1.0, &scale, &mut rng).unwrap();
        assert_eq!(note.pitch, 64 - 24);
        assert_eq!(note.velocity, 110);
        assert_eq!(note.duration, Duration::from_millis(700));

        // bar 9 wraps to degree 2 of a 7-note scale
        let note = bass_basic(2, 9, 1.0, &scale, &mut rng).unwrap();
        assert_eq!(note.pitch, 64 - 24);

        assert!(bass_basic(1, 0, 1.0, &scale, &mut rng).is_none());
        assert!(bass_basic(3, 0, 1.0, &scale, &mut rng).is_none());
    }

    #[test]
    fn test_bass_acid_stays_in_range() {
        let scale = Scale::new(11, ScaleType::Blues);
        let lowest = scale.pitches()[0] - 24;
        let highest = scale.pitches()[scale.len() - 1] - 24 + 3;
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let note = bass_acid(1.0, &scale, &mut rng).unwrap();
            assert!(note.pitch >= lowest && note.pitch <= highest);
            assert_eq!(note.duration, Duration::from_millis(300));
        }
    }

    #[test]
    fn test_melody_only_on_phrase_downbeats() {
        let scale = Scale::new(0, ScaleType::Pentatonic);
        let mut rng = StdRng::seed_from_u64(5);
        for bar in 0..16u8 {
            for beat in 0..4u8 {
                let note = melody_sparse(beat, bar, 1.0, &scale, &mut rng);
                if beat == 0 && bar % 4 == 0 {
                    let note = note.unwrap();
                    assert!(scale.pitches().contains(&note.pitch));
                    assert_eq!(note.velocity, 100);
                } else {
                    assert!(note.is_none());
                }
            }
        }
    }

    #[test]
    fn test_zero_intensity_never_fires_gated_voices() {
        let scale = Scale::new(0, ScaleType::Minor);
        let mut rng = StdRng::seed_from_u64(99);
        let mut fired = 0;
        for i in 0..10_000u32 {
            let beat = (i % 4) as u8;
            let bar = ((i / 4) % 16) as u8;
            fired += bass_basic(beat, bar, 0.0, &scale, &mut rng).is_some() as u32;
            fired += bass_acid(0.0, &scale, &mut rng).is_some() as u32;
            fired += melody_sparse(beat, bar, 0.0, &scale, &mut rng).is_some() as u32;
        }
        assert_eq!(fired, 0);
    }

    #[test]
    fn test_disabled_voices_are_silent() {
        let mut params = SessionParameters::default();
        params.drum.enabled = false;
        params.bass.enabled = false;
        params.melody.enabled = true;
        params.melody.intensity = 1.0;

        let mut generator = PatternGenerator::seeded(42);
        for bar in 0..16u8 {
            for beat in 0..4u8 {
                let triggers = generator.generate(&params, bar, beat);
                assert_eq!(count_voice(&triggers, Voice::Drum), 0);
                assert_eq!(count_voice(&triggers, Voice::Bass), 0);
            }
        }
    }

    #[test]
    fn test_hihat_comes_last() {
        let mut params = SessionParameters::default();
        params.bass.intensity = 1.0;
        params.melody.intensity = 1.0;

        let mut generator = PatternGenerator::seeded(0);
        let triggers = generator.generate(&params, 0, 0);
        // kick, bass, melody, hat
        assert_eq!(triggers.len(), 4);
        assert_eq!(triggers[0].pitch, 36);
        assert_eq!(triggers[1].voice, Voice::Bass);
        assert_eq!(triggers[2].voice, Voice::Melody);
        assert_eq!(triggers[3].pitch, 42);
        assert_eq!(triggers[3].duration, Duration::from_millis(50));
    }

    #[test]
    fn test_seeded_generators_agree() {
        let mut params = SessionParameters::default();
        params.drum_pattern = DrumPattern::Breaks;
        params.bass_pattern = BassPattern::Acid;

        let mut a = PatternGenerator::seeded(1234);
        let mut b = PatternGenerator::seeded(1234);
        for bar in 0..16u8 {
            for beat in 0..4u8 {
                assert_eq!(a.generate(&params, bar, beat), b.generate(&params, bar, beat));
            }
        }
    }

    #[test]
    fn test_parse_patterns() {
        assert_eq!("breaks".parse::<DrumPattern>(), Ok(DrumPattern::Breaks));
        assert_eq!("1".parse::<BassPattern>(), Ok(BassPattern::Acid));
        assert!("acid".parse::<DrumPattern>().is_err());
        assert_eq!("Drums".parse::<Voice>(), Ok(Voice::Drum));
        assert!("guitar".parse::<Voice>().is_err());
    }
}
