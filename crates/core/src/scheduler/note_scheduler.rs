//! Note lifecycle: note-on now, exactly one note-off later.
//!
//! Pending note-offs live in a min-heap keyed by deadline. A single timer
//! task sleeps until the earliest deadline and releases everything due. The
//! beat clock and the control surface have no way to cancel a pending
//! note-off; only [`NoteScheduler::flush`] releases them early.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::error::TransportError;
use crate::midi::midi::MidiMessage;
use crate::output::NoteOutput;
use crate::pattern::pattern::{TriggerRequest, Voice};

/// A note that has been switched on and is waiting for its note-off.
///
/// Ordered by deadline, then by trigger order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ActiveNote {
    deadline: Instant,
    sequence: u64,
    voice: Voice,
    channel: u8,
    pitch: u8,
}

impl ActiveNote {
    fn note_off(&self) -> MidiMessage {
        MidiMessage::NoteOff {
            channel: self.channel,
            note: self.pitch,
        }
    }
}

#[derive(Default)]
struct PendingNotes {
    heap: BinaryHeap<Reverse<ActiveNote>>,
    next_sequence: u64,
    closed: bool,
}

impl PendingNotes {
    fn pop_due(&mut self, now: Instant) -> Vec<ActiveNote> {
        let mut due = Vec::new();
        while let Some(Reverse(note)) = self.heap.peek() {
            if note.deadline > now {
                break;
            }
            due.push(*note);
            self.heap.pop();
        }
        due
    }

    fn drain_all(&mut self) -> Vec<ActiveNote> {
        let mut all = Vec::with_capacity(self.heap.len());
        while let Some(Reverse(note)) = self.heap.pop() {
            all.push(note);
        }
        all
    }
}

struct SchedulerInner {
    output: Arc<dyn NoteOutput>,
    pending: Mutex<PendingNotes>,
    wake: Notify,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulerInner {
    fn release(&self, note: ActiveNote) {
        log::trace!("{} off: pitch {}", note.voice, note.pitch);
        if let Err(e) = self.output.send(note.note_off()) {
            log::warn!(
                "Dropped note-off for {} pitch {}: {}",
                note.voice,
                note.pitch,
                e
            );
        }
    }

    async fn run_timer(self: Arc<Self>) {
        loop {
            let (due, next_deadline) = {
                let mut pending = self.pending.lock();
                if pending.closed {
                    break;
                }
                let due = pending.pop_due(Instant::now());
                let next = pending.heap.peek().map(|Reverse(note)| note.deadline);
                (due, next)
            };

            if !due.is_empty() {
                for note in due {
                    self.release(note);
                }
                continue;
            }

            match next_deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = sleep_until(deadline) => {}
                        _ = self.wake.notified() => {}
                    }
                }
                None => self.wake.notified().await,
            }
        }
        log::debug!("Note scheduler timer stopped");
    }
}

/// Owns every sounding note and guarantees each one is switched off once.
///
/// Cloning shares the same pending set and timer.
#[derive(Clone)]
pub struct NoteScheduler {
    inner: Arc<SchedulerInner>,
}

impl NoteScheduler {
    /// Start a scheduler writing to `output`. Must be called from within a
    /// Tokio runtime; the timer task is spawned onto it.
    pub fn spawn(output: Arc<dyn NoteOutput>) -> Self {
        let inner = Arc::new(SchedulerInner {
            output,
            pending: Mutex::new(PendingNotes::default()),
            wake: Notify::new(),
            timer: Mutex::new(None),
        });
        let handle = tokio::spawn(Arc::clone(&inner).run_timer());
        *inner.timer.lock() = Some(handle);
        Self { inner }
    }

    /// Name of the output this scheduler writes to.
    pub fn output_name(&self) -> &str {
        self.inner.output.name()
    }

    /// Send the note-on now and schedule its note-off `request.duration` later.
    ///
    /// If the note-on send fails the note-off is still scheduled and the
    /// send error is returned. After [`shutdown`](Self::shutdown) nothing is
    /// sent and `TransportError::Closed` is returned.
    pub fn trigger(&self, request: &TriggerRequest) -> Result<(), TransportError> {
        if self.inner.pending.lock().closed {
            return Err(TransportError::Closed);
        }

        let channel = request.voice.channel();
        let sent = self.inner.output.send(MidiMessage::NoteOn {
            channel,
            note: request.pitch,
            velocity: request.velocity,
        });
        log::trace!(
            "{} on: pitch {} vel {} for {:?}",
            request.voice,
            request.pitch,
            request.velocity,
            request.duration
        );

        let deadline = Instant::now() + request.duration;
        let orphan = {
            let mut pending = self.inner.pending.lock();
            let note = ActiveNote {
                deadline,
                sequence: pending.next_sequence,
                voice: request.voice,
                channel,
                pitch: request.pitch,
            };
            pending.next_sequence += 1;
            if pending.closed {
                // Shut down while the note-on was in flight; nobody will drain it.
                Some(note)
            } else {
                pending.heap.push(Reverse(note));
                None
            }
        };

        match orphan {
            Some(note) => self.inner.release(note),
            None => self.inner.wake.notify_one(),
        }

        sent
    }

    /// Number of notes still waiting for their note-off.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().heap.len()
    }

    /// Deadline of the next note-off, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner
            .pending
            .lock()
            .heap
            .peek()
            .map(|Reverse(note)| note.deadline)
    }

    /// Send every pending note-off immediately, in deadline order.
    pub fn flush(&self) -> usize {
        let notes = self.inner.pending.lock().drain_all();
        let count = notes.len();
        for note in notes {
            self.inner.release(note);
        }
        if count > 0 {
            log::info!("Flushed {} pending note-offs", count);
        }
        count
    }

    /// Flush, refuse further triggers and stop the timer task.
    pub fn shutdown(&self) {
        let notes = {
            let mut pending = self.inner.pending.lock();
            if pending.closed {
                return;
            }
            pending.closed = true;
            pending.drain_all()
        };
        for note in notes {
            self.inner.release(note);
        }
        self.inner.wake.notify_one();
        // The timer exits on its own once it observes `closed`.
        drop(self.inner.timer.lock().take());
        log::info!("Note scheduler for '{}' shut down", self.output_name());
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.pending.lock().closed
    }
}
