use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tracks the request history of one domain
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of requests made to this domain in the current crawl
    pub request_count: u32,

    /// Time of the last request to this domain (or the reserved next slot)
    pub last_request_time: Option<Instant>,
}

impl DomainState {
    /// Creates a new DomainState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if a request can be made to this domain at `now`
    pub fn can_request(&self, min_delay: Duration, now: Instant) -> bool {
        self.time_until_next_request(min_delay, now).is_none()
    }

    /// Records that a request was made to this domain
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Calculates the time until the next request can be made
    ///
    /// # Arguments
    ///
    /// * `min_delay` - Required spacing between two requests
    /// * `now` - The instant to measure from
    ///
    /// # Returns
    ///
    /// `None` if a request can be made now, otherwise the remaining wait.
    /// A spacing too large to represent as an `Instant` is capped at
    /// `min_delay` from `now`.
    pub fn time_until_next_request(&self, min_delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let Some(ready_at) = last.checked_add(min_delay) else {
            return Some(min_delay);
        };
        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }
}

/// Combines the configured rate limit with a robots.txt crawl delay
///
/// # Arguments
///
/// * `rate_limit` - Configured minimum spacing between requests
/// * `crawl_delay` - `Crawl-delay` from robots.txt, in seconds
/// * `max_crawl_delay` - Ceiling applied to the robots.txt value
///
/// # Returns
///
/// The larger of the rate limit and the capped crawl delay. Negative, NaN
/// and unrepresentable crawl delays are ignored or capped.
pub fn effective_delay(
    rate_limit: Duration,
    crawl_delay: Option<f64>,
    max_crawl_delay: Duration,
) -> Duration {
    let robots = match crawl_delay {
        Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
            .unwrap_or(max_crawl_delay)
            .min(max_crawl_delay),
        _ => Duration::ZERO,
    };
    rate_limit.max(robots)
}

/// Per-domain request spacing shared by all workers
///
/// Each call to [`DomainThrottle::wait`] reserves the domain's next request
/// slot before sleeping, so concurrent workers hitting the same domain queue
/// up behind each other instead of firing together.
#[derive(Debug)]
pub struct DomainThrottle {
    rate_limit: Duration,
    max_crawl_delay: Duration,
    domains: Mutex<HashMap<String, DomainState>>,
}

impl DomainThrottle {
    pub fn new(rate_limit: Duration, max_crawl_delay: Duration) -> Self {
        Self {
            rate_limit,
            max_crawl_delay,
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to `domain` is allowed and records it
    ///
    /// Returns the time spent waiting.
    pub async fn wait(&self, domain: &str, crawl_delay: Option<f64>) -> Duration {
        let delay = effective_delay(self.rate_limit, crawl_delay, self.max_crawl_delay);

        let wait = {
            let mut domains = self.domains.lock().await;
            let state = domains.entry(domain.to_string()).or_default();
            let now = Instant::now();
            let wait = state.time_until_next_request(delay, now).unwrap_or(Duration::ZERO);
            state.record_request(now + wait);
            wait
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Number of requests recorded for a domain
    pub async fn request_count(&self, domain: &str) -> u32 {
        self.domains
            .lock()
            .await
            .get(domain)
            .map(|s| s.request_count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_request_initially() {
        let state = DomainState::new();
        assert!(state.can_request(Duration::from_millis(1000), Instant::now()));
    }

    #[test]
    fn test_cannot_request_too_soon() {
        let mut state = DomainState::new();
        let now = Instant::now();
        state.record_request(now);

        let min = Duration::from_millis(1000);
        assert!(!state.can_request(min, now));
        assert!(!state.can_request(min, now + Duration::from_millis(500)));
        assert!(state.can_request(min, now + Duration::from_millis(1100)));
    }

    #[test]
    fn test_time_until_next_request() {
        let mut state = DomainState::new();
        let min = Duration::from_millis(1000);
        let now = Instant::now();

        assert!(state.time_until_next_request(min, now).is_none());

        state.record_request(now);
        assert_eq!(state.time_until_next_request(min, now), Some(min));

        let soon = now + Duration::from_millis(500);
        assert_eq!(
            state.time_until_next_request(min, soon),
            Some(Duration::from_millis(500))
        );

        assert!(state
            .time_until_next_request(min, now + Duration::from_millis(1100))
            .is_none());
    }

    #[test]
    fn test_record_request_counts() {
        let mut state = DomainState::new();
        let now = Instant::now();
        state.record_request(now);
        state.record_request(now);
        assert_eq!(state.request_count, 2);
        assert_eq!(state.last_request_time, Some(now));
    }

    const MAX: Duration = Duration::from_secs(60);

    #[test]
    fn test_effective_delay_takes_larger() {
        let rate = Duration::from_millis(500);
        assert_eq!(effective_delay(rate, None, MAX), rate);
        assert_eq!(effective_delay(rate, Some(0.1), MAX), rate);
        assert_eq!(effective_delay(rate, Some(2.0), MAX), Duration::from_secs(2));
        assert_eq!(effective_delay(rate, Some(-1.0), MAX), rate);
        assert_eq!(effective_delay(rate, Some(f64::NAN), MAX), rate);
    }

    #[test]
    fn test_effective_delay_caps_huge_crawl_delay() {
        let rate = Duration::from_millis(500);
        assert_eq!(effective_delay(rate, Some(1e20), MAX), MAX);
        assert_eq!(effective_delay(rate, Some(1e19), MAX), MAX);
        assert_eq!(effective_delay(rate, Some(f64::INFINITY), MAX), MAX);
        assert_eq!(effective_delay(rate, Some(3600.0), MAX), MAX);
    }

    #[test]
    fn test_time_until_next_request_survives_overflow() {
        let mut state = DomainState::new();
        let now = Instant::now();
        state.record_request(now);

        let huge = Duration::MAX;
        assert_eq!(state.time_until_next_request(huge, now), Some(huge));
        assert!(!state.can_request(huge, now));
    }

    #[tokio::test]
    async fn test_throttle_first_request_is_immediate() {
        let throttle = DomainThrottle::new(Duration::from_millis(200), MAX);
        let waited = throttle.wait("a.com", None).await;
        assert_eq!(waited, Duration::ZERO);
        assert_eq!(throttle.request_count("a.com").await, 1);
    }

    #[tokio::test]
    async fn test_throttle_spaces_same_domain() {
        let throttle = DomainThrottle::new(Duration::from_millis(100), MAX);
        throttle.wait("a.com", None).await;

        let waited = throttle.wait("a.com", None).await;
        assert!(waited > Duration::from_millis(50));

        // Other domains are independent
        let other = throttle.wait("b.com", None).await;
        assert_eq!(other, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_throttle_uses_crawl_delay() {
        let throttle = DomainThrottle::new(Duration::from_millis(10), MAX);
        throttle.wait("a.com", Some(0.2)).await;
        let waited = throttle.wait("a.com", Some(0.2)).await;
        assert!(waited > Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_throttle_clamps_hostile_crawl_delay() {
        let cap = Duration::from_millis(50);
        let throttle = DomainThrottle::new(Duration::from_millis(10), cap);
        throttle.wait("a.com", Some(1e20)).await;
        let waited = throttle.wait("a.com", Some(1e20)).await;
        assert!(waited <= cap);
        assert!(waited > Duration::from_millis(20));
    }
}
