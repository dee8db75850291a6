use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep_until, Instant};

use crate::pattern::pattern::PatternGenerator;
use crate::session::session::SessionShared;

pub const BEATS_PER_BAR: u8 = 4;
pub const BARS_PER_LOOP: u8 = 16;

/// Position of the clock within the performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoopState {
    /// Completed-or-current loops since the controller was created. Never reset.
    pub loop_count: u64,
    /// 0-15
    pub bar: u8,
    /// 0-3
    pub beat: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClockState {
    Idle,
    Running,
}

/// Drives bar/beat iteration for one start..stop span of the session.
///
/// Each beat: snapshot the parameters, generate triggers, hand them to the
/// scheduler of the currently bound output, then sleep until the next absolute beat deadline. Deadlines
/// accumulate from the previous deadline rather than from when the work
/// finished, so short overruns are absorbed by the following beat.
pub struct BeatClock {
    shared: Arc<SessionShared>,
    generator: PatternGenerator,
    generation: u64,
}

impl BeatClock {
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        generator: PatternGenerator,
        generation: u64,
    ) -> Self {
        Self {
            shared,
            generator,
            generation,
        }
    }

    /// Run until the session is stopped (or restarted, which starts a new clock).
    pub async fn run(mut self) {
        log::info!(
            "Beat clock started at {} BPM",
            self.shared.params_snapshot().tempo
        );

        let mut next_beat = Instant::now();
        'session: loop {
            if !self.shared.is_current(self.generation) {
                break;
            }
            let loop_count = self.shared.begin_loop();
            log::debug!("Loop {} started", loop_count);

            for bar in 0..BARS_PER_LOOP {
                for beat in 0..BEATS_PER_BAR {
                    if !self.shared.is_current(self.generation) {
                        break 'session;
                    }
                    let Some(scheduler) = self.shared.scheduler() else {
                        log::warn!("No output bound, stopping beat clock");
                        break 'session;
                    };

                    let beat_start = Instant::now();
                    let params = self.shared.params_snapshot();
                    self.shared.set_position(bar, beat);

                    let triggers = self.generator.generate(&params, bar, beat);
                    log::trace!("Bar {} beat {}: {} triggers", bar, beat, triggers.len());
                    for trigger in &triggers {
                        if let Err(e) = scheduler.trigger(trigger) {
                            log::warn!("Failed to trigger {} note: {}", trigger.voice, e);
                        }
                    }

                    let beat_duration = params.beat_duration();
                    next_beat = next_deadline(next_beat, beat_duration, Instant::now());
                    if Instant::now() - beat_start > beat_duration {
                        log::warn!(
                            "Beat {}:{} overran its {:?} budget",
                            bar,
                            beat,
                            beat_duration
                        );
                    }
                    sleep_until(next_beat).await;
                }
            }
        }

        log::info!("Beat clock stopped");
    }
}

/// Deadline of the beat after the one scheduled at `previous`.
///
/// Falls back to `now` when the clock is more than a whole beat behind, so a
/// long stall skips beats instead of replaying them in a burst.
pub fn next_deadline(previous: Instant, beat_duration: Duration, now: Instant) -> Instant {
    let next = previous + beat_duration;
    if now > next + beat_duration {
        log::warn!(
            "Beat clock fell {:?} behind, re-anchoring",
            now.duration_since(next)
        );
        now
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_deadline_accumulates() {
        let start = Instant::now();
        let beat = Duration::from_millis(500);
        let next = next_deadline(start, beat, start + Duration::from_millis(20));
        assert_eq!(next - start, beat);

        // An overrun within one beat is absorbed by the following deadline.
        let next = next_deadline(start, beat, start + Duration::from_millis(700));
        assert_eq!(next - start, beat);
    }

    #[test]
    fn test_next_deadline_reanchors_after_long_stall() {
        let start = Instant::now();
        let beat = Duration::from_millis(500);
        let now = start + Duration::from_millis(1600);
        assert_eq!(next_deadline(start, beat, now), now);
    }
}
