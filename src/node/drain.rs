//! Drain completion tracking
//!
//! Decides, from each observed node state, whether drain polling should
//! continue, and accounts accumulated wait time against the caller's
//! deadline. Pure state with no clock of its own — the async loop in
//! [`crate::node`] owns the actual delays, which keeps every transition
//! unit-testable without waiting.

use std::time::Duration;

/// Node state reported while eviction is still in progress
const STATE_DRAINING: &str = "draining";

/// Terminal node state for a completed drain
const STATE_DRAINED: &str = "drained";

/// Verdict for a single drain poll observation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollVerdict {
    /// Still draining and within the deadline; sleep one interval and
    /// observe again
    Continue,

    /// The node reached the drained state
    Succeeded,

    /// Accumulated wait time reached the deadline before the drain finished
    TimedOut,

    /// The node left the draining state without reaching drained — the
    /// drain was cancelled or failed remotely
    RemoteFailed(String),
}

/// Tracks one drain operation's progress against its deadline.
///
/// Each `Continue` verdict accounts one interval of upcoming wait; the
/// caller sleeps exactly that long before the next observation. Total
/// observations are therefore bounded by `timeout / interval + 1`.
#[derive(Clone, Debug)]
pub struct DrainWatch {
    timeout: Duration,
    interval: Duration,
    elapsed: Duration,
}

impl DrainWatch {
    /// Create a watch for a drain bounded by `timeout`, checking every
    /// `interval`
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            elapsed: Duration::ZERO,
        }
    }

    /// Interval to sleep between observations
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait time accounted so far
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Fold one observed node state into the watch
    pub fn observe(&mut self, state: &str) -> PollVerdict {
        match state {
            STATE_DRAINED => PollVerdict::Succeeded,
            STATE_DRAINING if self.elapsed < self.timeout => {
                self.elapsed += self.interval;
                PollVerdict::Continue
            }
            STATE_DRAINING => PollVerdict::TimedOut,
            other => PollVerdict::RemoteFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch(timeout_secs: u64) -> DrainWatch {
        DrainWatch::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_drained_succeeds_immediately() {
        assert_eq!(watch(120).observe("drained"), PollVerdict::Succeeded);
    }

    #[test]
    fn test_draining_continues_until_deadline() {
        let mut watch = watch(12);
        // Observations at accounted 0s, 5s, and 10s stay under the 12s
        // deadline; the fourth hits it.
        assert_eq!(watch.observe("draining"), PollVerdict::Continue);
        assert_eq!(watch.observe("draining"), PollVerdict::Continue);
        assert_eq!(watch.observe("draining"), PollVerdict::Continue);
        assert_eq!(watch.observe("draining"), PollVerdict::TimedOut);
        assert_eq!(watch.elapsed(), Duration::from_secs(15));
    }

    #[test]
    fn test_zero_timeout_never_waits() {
        assert_eq!(watch(0).observe("draining"), PollVerdict::TimedOut);
    }

    #[test]
    fn test_any_other_state_is_a_remote_failure() {
        let mut watch = watch(120);
        match watch.observe("active") {
            PollVerdict::RemoteFailed(state) => assert_eq!(state, "active"),
            verdict => panic!("expected remote failure, got {verdict:?}"),
        }
        assert_eq!(
            watch.observe("cordoned"),
            PollVerdict::RemoteFailed("cordoned".to_string())
        );
    }

    #[test]
    fn test_success_still_possible_after_long_wait() {
        let mut watch = watch(10);
        assert_eq!(watch.observe("draining"), PollVerdict::Continue);
        assert_eq!(watch.observe("draining"), PollVerdict::Continue);
        // Deadline reached, but the node made it.
        assert_eq!(watch.observe("drained"), PollVerdict::Succeeded);
    }

    #[test]
    fn test_observation_bound_matches_interval_count() {
        // timeout 13s, interval 5s: observations at 0, 5, 10 continue,
        // the fourth times out — ceil(13/5) + 1 = 4 total.
        let mut watch = DrainWatch::new(Duration::from_secs(13), Duration::from_secs(5));
        let mut observations = 0;
        loop {
            observations += 1;
            if watch.observe("draining") != PollVerdict::Continue {
                break;
            }
        }
        assert_eq!(observations, 4);
    }
}
