//! Trailing-edge debounce for scene change events.
//!
//! Every change notification pushes the flush deadline out by the configured
//! delay, so a burst of edits produces one write once the burst pauses. The
//! note a flush is for is captured when it is scheduled; the scene content
//! is read only when the flush fires.
//!
//! Time is always passed in, which keeps the scheduler free of timers: the
//! caller decides when to ask [`AutosaveScheduler::due`].

use std::time::{Duration, Instant};

use tracing::trace;

use crate::entity::NoteId;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingFlush {
    target: NoteId,
    deadline: Instant,
}

#[derive(Debug)]
pub struct AutosaveScheduler {
    delay: Duration,
    pending: Option<PendingFlush>,
}

impl AutosaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Record a change to `target` at `now`. Replaces any pending flush.
    pub fn notify(&mut self, target: NoteId, now: Instant) {
        let deadline = now + self.delay;
        trace!(note = %target, "autosave deadline pushed");
        self.pending = Some(PendingFlush { target, deadline });
    }

    /// When the pending flush should fire, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn pending_target(&self) -> Option<&NoteId> {
        self.pending.as_ref().map(|p| &p.target)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending flush if its deadline has passed.
    pub fn due(&mut self, now: Instant) -> Option<NoteId> {
        let ready = self.pending.as_ref().is_some_and(|p| p.deadline <= now);
        if ready {
            self.pending.take().map(|p| p.target)
        } else {
            None
        }
    }

    /// Take the pending flush regardless of its deadline.
    pub fn take_pending(&mut self) -> Option<NoteId> {
        self.pending.take().map(|p| p.target)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    #[test]
    fn test_nothing_pending_initially() {
        let mut scheduler = AutosaveScheduler::new(DELAY);
        assert!(!scheduler.is_pending());
        assert_eq!(scheduler.due(Instant::now()), None);
    }

    #[test]
    fn test_fires_after_delay() {
        let mut scheduler = AutosaveScheduler::new(DELAY);
        let start = Instant::now();
        let a = NoteId::from("a");

        scheduler.notify(a.clone(), start);
        assert_eq!(scheduler.due(start + Duration::from_millis(499)), None);
        assert_eq!(scheduler.due(start + DELAY), Some(a));
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn test_burst_coalesces_into_one_flush() {
        let mut scheduler = AutosaveScheduler::new(DELAY);
        let start = Instant::now();
        let a = NoteId::from("a");

        let mut fired = 0;
        for i in 0..20u64 {
            let now = start + Duration::from_millis(i * 100);
            if scheduler.due(now).is_some() {
                fired += 1;
            }
            scheduler.notify(a.clone(), now);
        }
        assert_eq!(fired, 0);

        let last = start + Duration::from_millis(1900);
        assert_eq!(scheduler.deadline(), Some(last + DELAY));
        assert_eq!(scheduler.due(last + DELAY), Some(a));
        assert_eq!(scheduler.due(last + DELAY * 4), None);
    }

    #[test]
    fn test_target_captured_at_notify_time() {
        let mut scheduler = AutosaveScheduler::new(DELAY);
        let start = Instant::now();

        scheduler.notify(NoteId::from("a"), start);
        assert_eq!(scheduler.pending_target(), Some(&NoteId::from("a")));

        scheduler.notify(NoteId::from("b"), start);
        assert_eq!(scheduler.take_pending(), Some(NoteId::from("b")));
        assert_eq!(scheduler.take_pending(), None);
    }

    #[test]
    fn test_cancel_drops_pending_flush() {
        let mut scheduler = AutosaveScheduler::new(DELAY);
        let start = Instant::now();

        scheduler.notify(NoteId::from("a"), start);
        scheduler.cancel();
        assert_eq!(scheduler.due(start + DELAY * 2), None);
    }
}
