use std::time::Duration;

/// How many times a missing duration is queried again.
pub const MAX_DURATION_RETRIES: u32 = 5;
/// Delay before the first retry; each later retry doubles it.
pub const BASE_RETRY_DELAY: Duration = Duration::from_millis(25);

/// Schedules follow-up duration queries for pipelines that report duration late.
///
/// Most elements never post a duration message, so after prerolling the
/// duration is polled with a growing delay until it shows up or the retries
/// run out.
#[derive(Debug, Clone, Default)]
pub struct DurationPoller {
    remaining: u32,
}

impl DurationPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the poller for a fresh round of retries.
    pub fn restart(&mut self) {
        self.remaining = MAX_DURATION_RETRIES;
    }

    pub fn cancel(&mut self) {
        self.remaining = 0;
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Feeds the result of a duration query.
    ///
    /// Returns the delay after which the next query should run, or `None` when
    /// polling is over.
    pub fn observe(&mut self, duration: Duration) -> Option<Duration> {
        if !duration.is_zero() {
            self.remaining = 0;
        }
        if self.remaining == 0 {
            return None;
        }
        let attempt = MAX_DURATION_RETRIES - self.remaining;
        self.remaining -= 1;
        Some(BASE_RETRY_DELAY * (1 << attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_five_times_with_doubling_delay() {
        let mut poller = DurationPoller::new();
        poller.restart();
        let delays: Vec<_> = std::iter::from_fn(|| poller.observe(Duration::ZERO)).collect();
        assert_eq!(
            delays,
            [25, 50, 100, 200, 400].map(Duration::from_millis).to_vec()
        );
        assert!(!poller.is_active());
    }

    #[test]
    fn positive_duration_stops_polling() {
        let mut poller = DurationPoller::new();
        poller.restart();
        assert!(poller.observe(Duration::ZERO).is_some());
        assert_eq!(poller.observe(Duration::from_secs(3)), None);
        assert_eq!(poller.observe(Duration::ZERO), None);
    }

    #[test]
    fn idle_poller_never_schedules() {
        let mut poller = DurationPoller::new();
        assert_eq!(poller.observe(Duration::ZERO), None);
    }
}
