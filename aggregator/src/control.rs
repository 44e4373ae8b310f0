// Control plane: admission control and circuit breakers
//
// Admission control bounds concurrent route resolutions and their request
// rate. A sliding-window breaker per upstream class short-circuits a
// failing routing service.
//
// Numan Thabit 2025 Nov

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info};

/// Bounds how many route resolutions run at once and how fast they reach
/// the routing service.
#[derive(Clone)]
pub struct AdmissionControl {
    inflight: Arc<Semaphore>,
    window: Arc<Mutex<RequestWindow>>,
}

/// Start times of the requests issued within the last `span`.
struct RequestWindow {
    limit: usize,
    span: Duration,
    issued: VecDeque<Instant>,
}

impl RequestWindow {
    /// Claim a slot at `now`, or report how long until one frees up.
    fn reserve(&mut self, now: Instant) -> Result<(), Duration> {
        while let Some(oldest) = self.issued.front() {
            if now.duration_since(*oldest) >= self.span {
                self.issued.pop_front();
            } else {
                break;
            }
        }
        if self.issued.len() < self.limit {
            self.issued.push_back(now);
            return Ok(());
        }
        let oldest = self.issued.front().copied().unwrap_or(now);
        Err(self.span.saturating_sub(now.duration_since(oldest)))
    }
}

impl AdmissionControl {
    /// `rate_per_sec` of zero disables the request window.
    pub fn new(max_inflight: usize, rate_per_sec: u32) -> Self {
        let limit = if rate_per_sec == 0 {
            usize::MAX
        } else {
            rate_per_sec as usize
        };
        Self {
            inflight: Arc::new(Semaphore::new(max_inflight)),
            window: Arc::new(Mutex::new(RequestWindow {
                limit,
                span: Duration::from_secs(1),
                issued: VecDeque::new(),
            })),
        }
    }

    /// Wait for a request slot, then for an inflight permit.
    /// Returns `None` only if the semaphore has been closed.
    pub async fn acquire(&self) -> Option<AdmissionPermit> {
        loop {
            let wait = match self.window.lock().await.reserve(Instant::now()) {
                Ok(()) => break,
                Err(wait) => wait,
            };
            debug!(wait_ms = wait.as_millis() as u64, "request window full");
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
        let permit = self.inflight.clone().acquire_owned().await.ok()?;
        Some(AdmissionPermit { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.inflight.available_permits()
    }
}

pub struct AdmissionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Thresholds shared by every breaker in a `CircuitBreakers` set.
#[derive(Debug, Clone, Copy)]
pub struct BreakerPolicy {
    pub max_window: usize,
    pub threshold: f32,
    pub min_samples: usize,
    pub open_cooldown: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            max_window: 100,
            threshold: 0.5,
            min_samples: 20,
            open_cooldown: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct CircuitBreakers {
    policy: BreakerPolicy,
    inner: Arc<Mutex<HashMap<String, Breaker>>>,
}

#[derive(Clone)]
struct Breaker {
    window: VecDeque<bool>, // true=failure, false=success
    open_until: Option<Instant>,
}

impl Default for CircuitBreakers {
    fn default() -> Self {
        Self::new(BreakerPolicy::default())
    }
}

impl CircuitBreakers {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn is_open(&self, class: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let b = inner
            .entry(class.to_string())
            .or_insert_with(|| Breaker::new(&self.policy));
        if let Some(until) = b.open_until {
            if Instant::now() < until {
                return true;
            }
            // Half-open: start the next window clean.
            b.open_until = None;
            b.window.clear();
            info!(class = %class, "circuit closed after cooldown");
        }
        false
    }

    pub async fn record_success(&self, class: &str) {
        self.record(class, false).await;
    }

    pub async fn record_failure(&self, class: &str) {
        self.record(class, true).await;
    }

    async fn record(&self, class: &str, failure: bool) {
        let policy = self.policy;
        let mut inner = self.inner.lock().await;
        let b = inner
            .entry(class.to_string())
            .or_insert_with(|| Breaker::new(&policy));
        if b.window.len() == policy.max_window {
            b.window.pop_front();
        }
        b.window.push_back(failure);

        let samples = b.window.len();
        if samples >= policy.min_samples {
            let fails = b.window.iter().filter(|x| **x).count();
            let rate = fails as f32 / samples as f32;
            if rate >= policy.threshold && b.open_until.is_none() {
                b.open_until = Some(Instant::now() + policy.open_cooldown);
                debug!(class = %class, rate = rate, samples = samples, "circuit opened");
            }
        }
    }
}

impl Breaker {
    fn new(policy: &BreakerPolicy) -> Self {
        Self {
            window: VecDeque::with_capacity(policy.max_window),
            open_until: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_failure_rate_crosses_threshold() {
        let breakers = CircuitBreakers::new(BreakerPolicy {
            max_window: 10,
            threshold: 0.5,
            min_samples: 4,
            open_cooldown: Duration::from_secs(60),
        });
        breakers.record_success("router").await;
        breakers.record_failure("router").await;
        breakers.record_success("router").await;
        assert!(!breakers.is_open("router").await);
        breakers.record_failure("router").await;
        assert!(breakers.is_open("router").await);
        assert!(!breakers.is_open("tokens").await);
    }

    #[tokio::test]
    async fn closes_after_cooldown() {
        let breakers = CircuitBreakers::new(BreakerPolicy {
            max_window: 4,
            threshold: 0.5,
            min_samples: 1,
            open_cooldown: Duration::from_millis(10),
        });
        breakers.record_failure("router").await;
        assert!(breakers.is_open("router").await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!breakers.is_open("router").await);
    }

    #[tokio::test]
    async fn admission_bounds_inflight() {
        let admission = AdmissionControl::new(2, 0);
        let a = admission.acquire().await.unwrap();
        let _b = admission.acquire().await.unwrap();
        assert_eq!(admission.available(), 0);
        drop(a);
        assert_eq!(admission.available(), 1);
    }

    #[test]
    fn request_window_reports_wait_until_oldest_expires() {
        let mut window = RequestWindow {
            limit: 2,
            span: Duration::from_secs(1),
            issued: VecDeque::new(),
        };
        let t0 = Instant::now();
        assert!(window.reserve(t0).is_ok());
        assert!(window.reserve(t0 + Duration::from_millis(100)).is_ok());
        assert_eq!(
            window.reserve(t0 + Duration::from_millis(400)),
            Err(Duration::from_millis(600))
        );
        assert!(window.reserve(t0 + Duration::from_secs(1)).is_ok());
    }
}
