//! Cancellable one-shot delays driven by the agent's own tick clock
//!
//! Each schedule bumps a generation counter. A handle only cancels the
//! schedule it was issued for, so a stale handle held by a collaborator
//! cannot cancel a newer delay.

/// Identifies one scheduled delay
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerHandle {
    generation: u64,
}

/// One-shot delay. At most one schedule is pending at a time; scheduling
/// again replaces it.
#[derive(Clone, Debug, Default)]
pub struct DelayTimer {
    generation: u64,
    deadline: Option<f32>,
}

impl DelayTimer {
    pub fn schedule(&mut self, now: f32, delay: f32) -> TimerHandle {
        self.generation += 1;
        self.deadline = Some(now + delay.max(0.0));
        TimerHandle {
            generation: self.generation,
        }
    }

    /// Drop whatever is pending
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            self.generation += 1;
        }
    }

    /// Cancel only if `handle` still refers to the pending schedule
    pub fn cancel_handle(&mut self, handle: TimerHandle) -> bool {
        if self.is_pending() && handle.generation == self.generation {
            self.cancel();
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn remaining(&self, now: f32) -> Option<f32> {
        self.deadline.map(|d| (d - now).max(0.0))
    }

    /// Returns true exactly once, on the first poll at or past the deadline
    pub fn poll(&mut self, now: f32) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_at_deadline() {
        let mut timer = DelayTimer::default();
        timer.schedule(1.0, 2.0);
        assert!(!timer.poll(2.9));
        assert!(timer.poll(3.0));
        assert!(!timer.poll(3.5));
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_stale_handle_cannot_cancel() {
        let mut timer = DelayTimer::default();
        let old = timer.schedule(0.0, 1.0);
        let new = timer.schedule(0.5, 1.0);
        assert!(!timer.cancel_handle(old));
        assert!(timer.is_pending());
        assert!(timer.cancel_handle(new));
        assert!(!timer.poll(10.0));
    }

    #[test]
    fn test_remaining() {
        let mut timer = DelayTimer::default();
        assert_eq!(timer.remaining(0.0), None);
        timer.schedule(0.0, 2.0);
        assert_eq!(timer.remaining(0.5), Some(1.5));
        assert_eq!(timer.remaining(5.0), Some(0.0));
    }
}
