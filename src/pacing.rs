//! Request pacing: process-wide timing state and mandatory delays.
//!
//! The forum throttles aggressively, so every outbound request goes through
//! one [`RequestPacer`] per crawl session. The pacer enforces a minimum
//! spacing since the previous request plus uniform jitter, and after every
//! Nth request adds a long cool-down so the traffic pattern does not look
//! metronomic.

use crate::config::CrawlerConfig;
use rand::{Rng, rng};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// Timing counters for one crawl session.
///
/// Mutated only by the pacer; a concurrent re-implementation must give each
/// session its own state rather than sharing one.
#[derive(Debug, Default)]
pub struct RequestState {
    /// Moment the most recent request was (or will be, after the computed
    /// wait) issued.
    pub last_request_time: Option<Instant>,
    /// Requests issued so far in this session.
    pub request_count: u64,
}

/// Computes the mandatory delay before each outbound request.
#[derive(Debug)]
pub struct RequestPacer {
    state: RequestState,
    min_interval: Duration,
    jitter_secs: (f64, f64),
    long_break_every: u64,
    long_break_secs: (f64, f64),
}

impl RequestPacer {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            state: RequestState::default(),
            min_interval: Duration::from_secs_f64(config.min_request_interval_secs),
            jitter_secs: config.jitter_secs,
            long_break_every: config.long_break_every,
            long_break_secs: config.long_break_secs,
        }
    }

    /// Compute the delay to observe before the next request and advance the
    /// session counters.
    ///
    /// The first request goes out immediately. Afterwards, if less than the
    /// minimum interval has passed since the previous request, the remainder
    /// of the floor plus jitter is imposed. Every `long_break_every`th
    /// request additionally draws a long cool-down. The recorded request
    /// instant accounts for the wait the caller is about to perform.
    pub fn next_delay(&mut self) -> Duration {
        let mut delay = Duration::ZERO;

        if let Some(last) = self.state.last_request_time {
            let since_last = last.elapsed();
            if since_last < self.min_interval {
                let jitter = rng().random_range(self.jitter_secs.0..=self.jitter_secs.1);
                delay = (self.min_interval - since_last) + Duration::from_secs_f64(jitter);
            }
        }

        self.state.request_count += 1;
        if self.long_break_every > 0 && self.state.request_count % self.long_break_every == 0 {
            let cool_down = rng().random_range(self.long_break_secs.0..=self.long_break_secs.1);
            delay += Duration::from_secs_f64(cool_down);
            debug!(
                request_count = self.state.request_count,
                cool_down_secs = cool_down,
                "Periodic cool-down scheduled"
            );
        }

        self.state.last_request_time = Some(Instant::now() + delay);
        delay
    }

    /// Compute the next delay and sleep it out.
    pub async fn wait(&mut self) {
        let delay = self.next_delay();
        if delay > Duration::ZERO {
            debug!(delay_ms = delay.as_millis() as u64, "Pacing wait");
            sleep(delay).await;
        }
    }

    pub fn request_count(&self) -> u64 {
        self.state.request_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacer(long_break_every: u64) -> RequestPacer {
        let config = CrawlerConfig {
            min_request_interval_secs: 5.0,
            jitter_secs: (2.0, 6.0),
            long_break_every,
            long_break_secs: (15.0, 30.0),
            ..CrawlerConfig::default()
        };
        RequestPacer::from_config(&config)
    }

    #[test]
    fn test_first_request_is_not_delayed() {
        let mut pacer = pacer(0);
        assert_eq!(pacer.next_delay(), Duration::ZERO);
        assert_eq!(pacer.request_count(), 1);
    }

    #[test]
    fn test_back_to_back_requests_hit_the_floor_plus_jitter() {
        let mut pacer = pacer(0);
        pacer.next_delay();
        let delay = pacer.next_delay().as_secs_f64();
        // remainder of the 5s floor (almost all of it) + 2..=6s jitter
        assert!(delay >= 6.0, "delay {delay} below floor + min jitter");
        assert!(delay <= 11.1, "delay {delay} above floor + max jitter");
    }

    #[test]
    fn test_periodic_cool_down_applies_on_the_nth_request() {
        let mut pacer = pacer(2);
        assert_eq!(pacer.next_delay(), Duration::ZERO);
        // 2nd request: floor + jitter + 15..=30s cool-down
        let delay = pacer.next_delay().as_secs_f64();
        assert!(delay >= 21.0, "delay {delay} missing the cool-down");
        assert!(delay <= 41.1);
    }

    #[test]
    fn test_counters_advance_monotonically() {
        let mut pacer = pacer(0);
        for expected in 1..=5 {
            pacer.next_delay();
            assert_eq!(pacer.request_count(), expected);
        }
        assert!(pacer.state.last_request_time.is_some());
    }
}
