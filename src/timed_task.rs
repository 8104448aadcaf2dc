/// Interval gate for one periodic task.
///
/// The next deadline is measured from the last time the gate actually fired, so an
/// overrun shifts the schedule instead of triggering a burst of catch-up runs. A gate
/// that has never fired opens on its first check.
///
/// Timestamps are microseconds from a free-running `u32` counter; wrap-around is handled
/// with wrapping arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimedTask {
    period_us: u32,
    last_fired_us: Option<u32>,
}

impl TimedTask {
    pub const fn new(period_us: u32) -> Self {
        Self {
            period_us,
            last_fired_us: None,
        }
    }

    /// Sets the period and forgets any previous firing.
    pub fn init(&mut self, period_us: u32) {
        self.period_us = period_us;
        self.last_fired_us = None;
    }

    /// Fires if the period has elapsed, recording `now_us` as the new baseline.
    pub fn check_and_update(&mut self, now_us: u32) -> bool {
        if self.ready(now_us) {
            self.last_fired_us = Some(now_us);
            true
        } else {
            false
        }
    }

    /// Same test as [`check_and_update`](Self::check_and_update) without consuming it.
    pub fn ready(&self, now_us: u32) -> bool {
        match self.last_fired_us {
            Some(last) => now_us.wrapping_sub(last) >= self.period_us,
            None => true,
        }
    }

    pub fn period_us(&self) -> u32 {
        self.period_us
    }

    pub fn last_fired_us(&self) -> Option<u32> {
        self.last_fired_us
    }
}
