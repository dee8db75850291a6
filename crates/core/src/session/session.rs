use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::clock::beat_clock::{BeatClock, ClockState, LoopState};
use crate::error::{SessionError, ValidationError};
use crate::messages::Settings;
use crate::output::NoteOutput;
use crate::pattern::pattern::{BassPattern, DrumPattern, PatternGenerator, Voice};
use crate::scale::scale::{key_name, Scale, ScaleType};
use crate::scheduler::note_scheduler::NoteScheduler;

pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;

/// Enabled flag and intensity (0.0-1.0) of one voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub enabled: bool,
    pub intensity: f64,
}

impl VoiceSettings {
    pub fn new(enabled: bool, intensity: f64) -> Self {
        Self {
            enabled,
            intensity: intensity.clamp(0.0, 1.0),
        }
    }
}

/// Every live-tunable musical parameter, read by the clock as one snapshot per beat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionParameters {
    pub tempo: u32,
    pub drum: VoiceSettings,
    pub bass: VoiceSettings,
    pub melody: VoiceSettings,
    pub key_root: u8,
    pub scale: ScaleType,
    pub drum_pattern: DrumPattern,
    pub bass_pattern: BassPattern,
}

impl Default for SessionParameters {
    fn default() -> Self {
        Self {
            tempo: 128,
            drum: VoiceSettings::new(true, 1.0),
            bass: VoiceSettings::new(true, 0.8),
            melody: VoiceSettings::new(true, 0.3),
            key_root: 0,
            scale: ScaleType::Major,
            drum_pattern: DrumPattern::Basic,
            bass_pattern: BassPattern::Basic,
        }
    }
}

impl SessionParameters {
    pub fn voice(&self, voice: Voice) -> &VoiceSettings {
        match voice {
            Voice::Drum => &self.drum,
            Voice::Bass => &self.bass,
            Voice::Melody => &self.melody,
        }
    }

    pub fn voice_mut(&mut self, voice: Voice) -> &mut VoiceSettings {
        match voice {
            Voice::Drum => &mut self.drum,
            Voice::Bass => &mut self.bass,
            Voice::Melody => &mut self.melody,
        }
    }

    /// 60 / tempo, exact to the nanosecond.
    pub fn beat_duration(&self) -> Duration {
        Duration::from_nanos(60_000_000_000 / u64::from(self.tempo.max(1)))
    }

    pub fn scale(&self) -> Scale {
        Scale::new(self.key_root, self.scale)
    }

    /// Reject anything a setter would reject; used for parameters built outside the controller.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_tempo(self.tempo)?;
        validate_key(self.key_root)?;
        for voice in Voice::ALL {
            // NaN fails the range check too
            if !(0.0..=1.0).contains(&self.voice(voice).intensity) {
                return Err(ValidationError::Intensity(voice));
            }
        }
        Ok(())
    }
}

impl From<&Settings> for SessionParameters {
    fn from(settings: &Settings) -> Self {
        Self {
            tempo: settings.bpm,
            drum: VoiceSettings::new(true, settings.drum_intensity),
            bass: VoiceSettings::new(true, settings.bass_intensity),
            melody: VoiceSettings::new(true, settings.melody_intensity),
            key_root: settings.key_root,
            scale: settings.scale,
            drum_pattern: settings.drum_pattern,
            bass_pattern: settings.bass_pattern,
        }
    }
}

fn validate_tempo(bpm: u32) -> Result<(), ValidationError> {
    if (MIN_BPM..=MAX_BPM).contains(&bpm) {
        Ok(())
    } else {
        Err(ValidationError::Tempo(bpm))
    }
}

fn validate_key(key_root: u8) -> Result<(), ValidationError> {
    if key_root < 12 {
        Ok(())
    } else {
        Err(ValidationError::KeyRoot(key_root))
    }
}

/// State shared between the controller and the running beat clock.
pub(crate) struct SessionShared {
    params: RwLock<SessionParameters>,
    loop_state: RwLock<LoopState>,
    scheduler: RwLock<Option<NoteScheduler>>,
    running: AtomicBool,
    generation: AtomicU64,
}

impl SessionShared {
    fn new(params: SessionParameters) -> Self {
        Self {
            params: RwLock::new(params),
            loop_state: RwLock::new(LoopState::default()),
            scheduler: RwLock::new(None),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn params_snapshot(&self) -> SessionParameters {
        *self.params.read()
    }

    /// Scheduler of the currently bound output, re-read by the clock every beat.
    pub(crate) fn scheduler(&self) -> Option<NoteScheduler> {
        self.scheduler.read().clone()
    }

    /// Supersede every earlier clock, then mark the session running.
    ///
    /// The generation moves first so an old clock waking in between never
    /// sees itself as current.
    fn begin_generation(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.running.store(true, Ordering::SeqCst);
        generation
    }

    /// True while running and no later start has superseded `generation`.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    pub(crate) fn begin_loop(&self) -> u64 {
        let mut state = self.loop_state.write();
        state.loop_count += 1;
        state.bar = 0;
        state.beat = 0;
        state.loop_count
    }

    pub(crate) fn set_position(&self, bar: u8, beat: u8) {
        let mut state = self.loop_state.write();
        state.bar = bar;
        state.beat = beat;
    }
}

/// Structured snapshot for the control surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: ClockState,
    pub tempo: u32,
    pub position: LoopState,
    pub drum: VoiceSettings,
    pub bass: VoiceSettings,
    pub melody: VoiceSettings,
    pub key_root: u8,
    pub key_name: &'static str,
    pub scale: ScaleType,
    pub drum_pattern: DrumPattern,
    pub bass_pattern: BassPattern,
    pub pending_note_offs: usize,
    pub output: Option<String>,
}

impl SessionStatus {
    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let on_off = |v: &VoiceSettings| if v.enabled { "ON" } else { "OFF" };

        writeln!(f, "STATUS:")?;
        writeln!(f, "  Playing: {}", if self.is_running() { "Yes" } else { "No" })?;
        writeln!(f, "  BPM: {}", self.tempo)?;
        writeln!(
            f,
            "  Loop: {} (bar {}, beat {})",
            self.position.loop_count,
            self.position.bar + 1,
            self.position.beat + 1
        )?;
        writeln!(
            f,
            "  Output: {}",
            self.output.as_deref().unwrap_or("not connected")
        )?;
        writeln!(f, "  Pending note-offs: {}", self.pending_note_offs)?;
        writeln!(f)?;
        writeln!(f, "INSTRUMENTS:")?;
        for (name, voice) in [
            ("Drums", &self.drum),
            ("Bass", &self.bass),
            ("Melody", &self.melody),
        ] {
            writeln!(
                f,
                "  {}: {} (intensity: {:.1})",
                name,
                on_off(voice),
                voice.intensity
            )?;
        }
        writeln!(f)?;
        writeln!(f, "MUSICAL:")?;
        writeln!(f, "  Key: {}", self.key_name)?;
        writeln!(f, "  Scale: {}", self.scale)?;
        writeln!(f, "  Drum pattern: {}", self.drum_pattern.display_name())?;
        write!(f, "  Bass pattern: {}", self.bass_pattern.display_name())
    }
}

/// Owns the session parameters and the Idle/Running lifecycle.
///
/// Every method takes `&self`, so the controller can be shared behind an
/// `Arc` between a control surface and anything else that tunes the jam.
pub struct SessionController {
    shared: Arc<SessionShared>,
    clock_handle: Mutex<Option<JoinHandle<()>>>,
    seed: Option<u64>,
}

impl SessionController {
    /// Build a controller, rejecting parameters any setter would reject.
    pub fn new(params: SessionParameters) -> Result<Self, ValidationError> {
        params.validate()?;
        Ok(Self::with_params(params))
    }

    fn with_params(params: SessionParameters) -> Self {
        Self {
            shared: Arc::new(SessionShared::new(params)),
            clock_handle: Mutex::new(None),
            seed: None,
        }
    }

    /// Make pattern decisions reproducible. Each start derives its own stream
    /// from the seed, the first one using the seed itself.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build a controller from validated configuration settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ValidationError> {
        let controller = Self::new(SessionParameters::from(settings))?;
        Ok(match settings.seed {
            Some(seed) => controller.with_seed(seed),
            None => controller,
        })
    }

    /// Attach the output all notes go to. Replaces (and flushes) any previous one;
    /// a running clock switches over from its next beat.
    /// Must be called from within a Tokio runtime.
    pub fn bind_output(&self, output: Arc<dyn NoteOutput>) {
        let scheduler = NoteScheduler::spawn(output);
        log::info!("Session bound to output '{}'", scheduler.output_name());
        let previous = self.shared.scheduler.write().replace(scheduler);
        if let Some(previous) = previous {
            previous.shutdown();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.scheduler.read().is_some()
    }

    /// Begin playback on a background task. A no-op while already running.
    pub fn start(&self) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let mut clock_handle = self.clock_handle.lock();
        if self.shared.running.load(Ordering::SeqCst) {
            if clock_alive(&clock_handle) {
                log::debug!("Start requested while already running");
                return Ok(());
            }
            log::warn!("Beat clock exited unexpectedly, restarting");
        }

        let generation = self.shared.begin_generation();
        self.shared.set_position(0, 0);

        let generator = match self.seed {
            Some(seed) => PatternGenerator::seeded(seed.wrapping_add(generation - 1)),
            None => PatternGenerator::from_entropy(),
        };
        let clock = BeatClock::new(Arc::clone(&self.shared), generator, generation);
        *clock_handle = Some(tokio::spawn(clock.run()));

        log::info!("Jam session started");
        Ok(())
    }

    /// Request playback to stop. Takes effect at the next beat boundary;
    /// notes already sounding still receive their note-off.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            log::info!("Jam session stopped");
        }
    }

    /// Stop, wait for the clock to finish its beat, and release every held note.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.clock_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::error!("Beat clock task failed: {}", e);
            }
        }
        let scheduler = self.shared.scheduler.write().take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown();
        }
    }

    /// True while a beat clock is playing. A clock task that died counts as stopped.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst) && clock_alive(&self.clock_handle.lock())
    }

    pub fn params(&self) -> SessionParameters {
        self.shared.params_snapshot()
    }

    pub fn loop_state(&self) -> LoopState {
        *self.shared.loop_state.read()
    }

    pub fn status(&self) -> SessionStatus {
        let params = self.params();
        let (pending_note_offs, output) = match self.shared.scheduler.read().as_ref() {
            Some(scheduler) => (
                scheduler.pending_count(),
                Some(scheduler.output_name().to_string()),
            ),
            None => (0, None),
        };

        SessionStatus {
            state: if self.is_running() {
                ClockState::Running
            } else {
                ClockState::Idle
            },
            tempo: params.tempo,
            position: self.loop_state(),
            drum: params.drum,
            bass: params.bass,
            melody: params.melody,
            key_root: params.key_root,
            key_name: key_name(params.key_root),
            scale: params.scale,
            drum_pattern: params.drum_pattern,
            bass_pattern: params.bass_pattern,
            pending_note_offs,
            output,
        }
    }

    /// Set the tempo (60-200 BPM). Takes effect from the next beat.
    pub fn set_tempo(&self, bpm: u32) -> Result<(), ValidationError> {
        validate_tempo(bpm)?;
        self.shared.params.write().tempo = bpm;
        log::info!("BPM set to {}", bpm);
        Ok(())
    }

    pub fn set_voice_enabled(&self, voice: Voice, enabled: bool) {
        self.shared.params.write().voice_mut(voice).enabled = enabled;
        log::info!("{}: {}", voice.display_name(), if enabled { "ON" } else { "OFF" });
    }

    /// Flip a voice on or off, returning the new state.
    pub fn toggle_voice(&self, voice: Voice) -> bool {
        let enabled = {
            let mut params = self.shared.params.write();
            let settings = params.voice_mut(voice);
            settings.enabled = !settings.enabled;
            settings.enabled
        };
        log::info!("{}: {}", voice.display_name(), if enabled { "ON" } else { "OFF" });
        enabled
    }

    /// Set a voice's intensity, clamped to 0.0-1.0. Returns the applied value.
    pub fn set_intensity(&self, voice: Voice, intensity: f64) -> Result<f64, ValidationError> {
        if intensity.is_nan() {
            return Err(ValidationError::Intensity(voice));
        }
        let clamped = intensity.clamp(0.0, 1.0);
        self.shared.params.write().voice_mut(voice).intensity = clamped;
        log::info!("{} intensity set to {:.2}", voice.display_name(), clamped);
        Ok(clamped)
    }

    pub fn set_key(&self, key_root: u8) -> Result<(), ValidationError> {
        validate_key(key_root)?;
        self.shared.params.write().key_root = key_root;
        log::info!("Key set to {}", key_name(key_root));
        Ok(())
    }

    pub fn set_scale(&self, scale: ScaleType) {
        self.shared.params.write().scale = scale;
        log::info!("Scale set to {}", scale);
    }

    /// Select a pattern variant by name. Melody only offers "sparse".
    pub fn set_pattern(&self, voice: Voice, variant: &str) -> Result<(), ValidationError> {
        match voice {
            Voice::Drum => {
                let pattern: DrumPattern = variant.parse()?;
                self.shared.params.write().drum_pattern = pattern;
                log::info!("Drum pattern set to {}", pattern.display_name());
            }
            Voice::Bass => {
                let pattern: BassPattern = variant.parse()?;
                self.shared.params.write().bass_pattern = pattern;
                log::info!("Bass pattern set to {}", pattern.display_name());
            }
            Voice::Melody => {
                if !variant.trim().eq_ignore_ascii_case("sparse") {
                    return Err(ValidationError::UnknownPattern {
                        voice,
                        name: variant.trim().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn clock_alive(handle: &Option<JoinHandle<()>>) -> bool {
    handle.as_ref().is_some_and(|handle| !handle.is_finished())
}

impl Default for SessionController {
    fn default() -> Self {
        Self::with_params(SessionParameters::default())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
        let scheduler = self.shared.scheduler.write().take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_bounds() {
        let controller = SessionController::default();
        assert_eq!(controller.set_tempo(59), Err(ValidationError::Tempo(59)));
        assert_eq!(controller.set_tempo(201), Err(ValidationError::Tempo(201)));
        assert_eq!(controller.params().tempo, 128);

        controller.set_tempo(60).unwrap();
        assert_eq!(controller.params().beat_duration(), Duration::from_secs(1));
        controller.set_tempo(200).unwrap();
        assert_eq!(
            controller.params().beat_duration(),
            Duration::from_millis(300)
        );
    }

    #[test]
    fn test_intensity_clamps() {
        let controller = SessionController::default();
        assert_eq!(controller.set_intensity(Voice::Bass, 1.7), Ok(1.0));
        assert_eq!(controller.set_intensity(Voice::Melody, -0.2), Ok(0.0));
        assert_eq!(controller.params().bass.intensity, 1.0);
        assert_eq!(controller.params().melody.intensity, 0.0);

        assert!(controller.set_intensity(Voice::Drum, f64::NAN).is_err());
        assert_eq!(controller.params().drum.intensity, 1.0);
    }

    #[test]
    fn test_new_rejects_what_setters_reject() {
        let mut params = SessionParameters::default();
        params.key_root = 12;
        assert!(matches!(
            SessionController::new(params),
            Err(ValidationError::KeyRoot(12))
        ));

        let mut params = SessionParameters::default();
        params.melody.intensity = f64::NAN;
        assert!(matches!(
            SessionController::new(params),
            Err(ValidationError::Intensity(Voice::Melody))
        ));

        let mut params = SessionParameters::default();
        params.bass.intensity = 1.5;
        assert!(matches!(
            SessionController::new(params),
            Err(ValidationError::Intensity(Voice::Bass))
        ));

        let mut params = SessionParameters::default();
        params.tempo = 30;
        assert!(SessionController::new(params).is_err());
        assert!(SessionController::new(SessionParameters::default()).is_ok());
    }

    #[test]
    fn test_new_generation_supersedes_old_clock() {
        let shared = SessionShared::new(SessionParameters::default());
        let first = shared.begin_generation();
        assert!(shared.is_current(first));

        shared.running.store(false, Ordering::SeqCst);
        let second = shared.begin_generation();
        assert!(!shared.is_current(first));
        assert!(shared.is_current(second));
    }

    #[test]
    fn test_key_and_scale() {
        let controller = SessionController::default();
        assert_eq!(controller.set_key(12), Err(ValidationError::KeyRoot(12)));
        assert_eq!(controller.params().key_root, 0);
        controller.set_key(11).unwrap();
        controller.set_scale(ScaleType::Blues);

        let status = controller.status();
        assert_eq!(status.key_name, "B");
        assert_eq!(status.scale, ScaleType::Blues);
    }

    #[test]
    fn test_patterns() {
        let controller = SessionController::default();
        controller.set_pattern(Voice::Drum, "breaks").unwrap();
        controller.set_pattern(Voice::Bass, "acid").unwrap();
        controller.set_pattern(Voice::Melody, "sparse").unwrap();
        assert!(controller.set_pattern(Voice::Drum, "acid").is_err());
        assert!(controller.set_pattern(Voice::Melody, "arp").is_err());

        let params = controller.params();
        assert_eq!(params.drum_pattern, DrumPattern::Breaks);
        assert_eq!(params.bass_pattern, BassPattern::Acid);
    }

    #[test]
    fn test_toggle_voice() {
        let controller = SessionController::default();
        assert!(!controller.toggle_voice(Voice::Drum));
        assert!(!controller.params().drum.enabled);
        assert!(controller.toggle_voice(Voice::Drum));
        controller.set_voice_enabled(Voice::Melody, false);
        assert!(!controller.status().melody.enabled);
    }

    #[test]
    fn test_start_without_output() {
        let controller = SessionController::default();
        assert!(matches!(
            controller.start(),
            Err(SessionError::NotConnected)
        ));
        assert!(!controller.is_running());
        assert_eq!(controller.status().state, ClockState::Idle);
    }

    #[test]
    fn test_status_display() {
        let text = SessionController::default().status().to_string();
        assert!(text.contains("Playing: No"));
        assert!(text.contains("BPM: 128"));
        assert!(text.contains("Bass: ON (intensity: 0.8)"));
        assert!(text.contains("Key: C"));
        assert!(text.contains("Output: not connected"));
    }
}
