// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded polling until cluster state converges.

use crate::config::HarnessConfig;
use crate::constants::poll;
use crate::error::{HarnessError, Result, WaitTimeout};
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// What a single poll saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub satisfied: bool,
    /// Human-readable description of the observed state
    pub state: String,
}

impl Observation {
    pub fn satisfied(state: impl Into<String>) -> Self {
        Self {
            satisfied: true,
            state: state.into(),
        }
    }

    pub fn pending(state: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            state: state.into(),
        }
    }
}

/// Interval and bounds of a polling loop
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
    /// Relative jitter, each sleep lasts `interval * [1 - jitter, 1 + jitter]`
    pub jitter: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(poll::INTERVAL_MS),
            max_attempts: Some(poll::MAX_ATTEMPTS),
            timeout: None,
            jitter: poll::JITTER,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            interval: config.poll_interval,
            max_attempts: config.max_attempts,
            timeout: config.timeout,
            jitter: poll::JITTER,
        }
    }

    /// Poll at most `attempts` times, without a time bound
    pub fn attempts(attempts: u32, interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: Some(attempts),
            timeout: None,
            jitter: 0.0,
        }
    }

    /// Poll until `timeout` elapsed, without an attempt bound
    pub fn deadline(timeout: Duration, interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            timeout: Some(timeout),
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts.is_none() && self.timeout.is_none() {
            return Err(HarnessError::Validation(
                "poll policy needs max_attempts or timeout".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(HarnessError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(HarnessError::Validation(format!(
                "jitter must be within [0, 1), got {}",
                self.jitter
            )));
        }
        Ok(())
    }

    fn next_delay(&self) -> Duration {
        if self.jitter == 0.0 {
            return self.interval;
        }
        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        self.interval.mul_f64(factor)
    }
}

type Predicate = Box<dyn Fn() -> BoxFuture<'static, Result<Observation>> + Send + Sync>;

/// A predicate over cluster state, re-evaluated with a fresh read on every poll
pub struct WaitCondition {
    description: String,
    predicate: Predicate,
    policy: Option<PollPolicy>,
}

impl WaitCondition {
    pub fn new<F, Fut>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Observation>> + Send + 'static,
    {
        Self {
            description: description.into(),
            predicate: Box::new(move || predicate().boxed()),
            policy: None,
        }
    }

    /// Poll with this policy instead of the waiter's default
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn policy(&self) -> Option<&PollPolicy> {
        self.policy.as_ref()
    }

    async fn poll(&self) -> Result<Observation> {
        (self.predicate)().await
    }
}

impl fmt::Debug for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitCondition")
            .field("description", &self.description)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Result of a polling loop
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub converged: bool,
    pub attempts: u32,
    /// Polls whose read failed and was retried
    pub failed_reads: u32,
    pub last_observed: String,
    pub elapsed: Duration,
}

/// Polls conditions until they hold or their bound is reached.
///
/// Holds no per-call state; clones can be used from many fixtures at once.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceWaiter {
    default_policy: PollPolicy,
}

impl ConvergenceWaiter {
    pub fn new(default_policy: PollPolicy) -> Self {
        Self { default_policy }
    }

    pub fn default_policy(&self) -> &PollPolicy {
        &self.default_policy
    }

    /// Poll until the condition holds or the bound is reached. Exhausting the
    /// bound is reported through `Outcome::converged`, not as an error.
    pub async fn observe(&self, condition: &WaitCondition) -> Result<Outcome> {
        let policy = condition.policy().unwrap_or(&self.default_policy);
        policy.validate()?;

        let start = Instant::now();
        let mut attempts = 0u32;
        let mut failed_reads = 0u32;
        let mut last_observed = "nothing observed yet".to_string();

        loop {
            attempts += 1;

            let polled = match policy.timeout {
                Some(timeout) => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    match tokio::time::timeout(remaining, condition.poll()).await {
                        Ok(polled) => polled,
                        Err(_) => {
                            failed_reads += 1;
                            last_observed = "read still pending at the deadline".to_string();
                            break;
                        }
                    }
                }
                None => condition.poll().await,
            };

            match polled {
                Ok(observation) => {
                    last_observed = observation.state;
                    if observation.satisfied {
                        info!(
                            condition = %condition.description(),
                            attempts,
                            "Condition converged"
                        );
                        return Ok(Outcome {
                            converged: true,
                            attempts,
                            failed_reads,
                            last_observed,
                            elapsed: start.elapsed(),
                        });
                    }
                    debug!(
                        condition = %condition.description(),
                        attempt = attempts,
                        state = %last_observed,
                        "Condition not met yet"
                    );
                }
                Err(e) if e.is_caller_error() => return Err(e),
                Err(e) => {
                    failed_reads += 1;
                    debug!(
                        condition = %condition.description(),
                        attempt = attempts,
                        error = %e,
                        "Read failed while polling"
                    );
                    last_observed = format!("read failed: {}", e);
                }
            }

            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                break;
            }

            let mut delay = policy.next_delay();
            if let Some(timeout) = policy.timeout {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    break;
                }
                delay = delay.min(timeout - elapsed);
            }

            sleep(delay).await;
        }

        Ok(Outcome {
            converged: false,
            attempts,
            failed_reads,
            last_observed,
            elapsed: start.elapsed(),
        })
    }

    /// Like [`observe`](Self::observe), but a condition that never held is a
    /// `Timeout` error carrying the last observed state.
    pub async fn wait_for(&self, condition: &WaitCondition) -> Result<Outcome> {
        let outcome = self.observe(condition).await?;
        if outcome.converged {
            return Ok(outcome);
        }

        warn!(
            condition = %condition.description(),
            attempts = outcome.attempts,
            last_observed = %outcome.last_observed,
            "Condition did not converge"
        );
        Err(WaitTimeout {
            description: condition.description().to_string(),
            attempts: outcome.attempts,
            failed_reads: outcome.failed_reads,
            elapsed: outcome.elapsed,
            last_observed: outcome.last_observed,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(attempts: u32) -> PollPolicy {
        PollPolicy::attempts(attempts, Duration::from_millis(5))
    }

    /// Condition that becomes true on the `n`th poll
    fn true_after(n: u32) -> (WaitCondition, Arc<AtomicU32>) {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let condition = WaitCondition::new("counter", move || {
            let c = c.clone();
            async move {
                let polls = c.fetch_add(1, Ordering::SeqCst) + 1;
                if polls >= n {
                    Ok(Observation::satisfied(format!("poll {}", polls)))
                } else {
                    Ok(Observation::pending(format!("poll {}", polls)))
                }
            }
        });
        (condition, counter)
    }

    #[tokio::test]
    async fn test_converges_immediately() {
        let (condition, _) = true_after(1);
        let outcome = ConvergenceWaiter::new(fast(10))
            .wait_for(&condition)
            .await
            .unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_converges_after_exactly_n_polls() {
        let (condition, counter) = true_after(4);
        let outcome = ConvergenceWaiter::new(fast(10))
            .wait_for(&condition)
            .await
            .unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.last_observed, "poll 4");
    }

    #[tokio::test]
    async fn test_attempt_bound_times_out() {
        let (condition, counter) = true_after(u32::MAX);
        let err = ConvergenceWaiter::new(fast(5))
            .wait_for(&condition)
            .await
            .unwrap_err();

        match err {
            HarnessError::Timeout(timeout) => {
                assert_eq!(timeout.attempts, 5);
                assert_eq!(timeout.description, "counter");
                assert_eq!(timeout.last_observed, "poll 5");
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_deadline_bound_times_out_not_before() {
        let (condition, _) = true_after(u32::MAX);
        let condition = condition.with_policy(PollPolicy::deadline(
            Duration::from_millis(100),
            Duration::from_millis(10),
        ));

        let outcome = ConvergenceWaiter::default()
            .observe(&condition)
            .await
            .unwrap();

        assert!(!outcome.converged);
        assert!(outcome.elapsed >= Duration::from_millis(100));
        assert!(outcome.elapsed < Duration::from_secs(2));
        assert!(outcome.attempts > 1);
    }

    #[tokio::test]
    async fn test_hanging_read_is_cut_at_deadline() {
        let condition = WaitCondition::new("hanging", || async {
            sleep(Duration::from_secs(30)).await;
            Ok(Observation::satisfied("too late"))
        })
        .with_policy(PollPolicy::deadline(
            Duration::from_millis(50),
            Duration::from_millis(10),
        ));

        let outcome = ConvergenceWaiter::default()
            .observe(&condition)
            .await
            .unwrap();

        assert!(!outcome.converged);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.failed_reads, 1);
        assert!(outcome.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_observe_reports_without_error() {
        let (condition, _) = true_after(u32::MAX);
        let outcome = ConvergenceWaiter::new(fast(3))
            .observe(&condition)
            .await
            .unwrap();

        assert!(!outcome.converged);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_transient_read_failures_are_swallowed() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let condition = WaitCondition::new("flaky", move || {
            let c = c.clone();
            async move {
                match c.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(HarnessError::Network("connection reset".to_string())),
                    _ => Ok(Observation::satisfied("ready")),
                }
            }
        });

        let outcome = ConvergenceWaiter::new(fast(10))
            .wait_for(&condition)
            .await
            .unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.failed_reads, 2);
    }

    #[tokio::test]
    async fn test_read_failures_until_exhausted_time_out() {
        let condition = WaitCondition::new("unreachable", || async {
            Err::<Observation, _>(HarnessError::Network("connection refused".to_string()))
        });

        let err = ConvergenceWaiter::new(fast(3))
            .wait_for(&condition)
            .await
            .unwrap_err();

        match err {
            HarnessError::Timeout(timeout) => {
                assert_eq!(timeout.failed_reads, 3);
                assert!(timeout.last_observed.contains("connection refused"));
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_caller_errors_surface_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let condition = WaitCondition::new("broken", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<Observation, _>(HarnessError::Validation("missing name".to_string())) }
        });

        let err = ConvergenceWaiter::new(fast(10))
            .wait_for(&condition)
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::Validation(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unbounded_policy_rejected() {
        let (condition, counter) = true_after(1);
        let condition = condition.with_policy(PollPolicy {
            max_attempts: None,
            timeout: None,
            ..Default::default()
        });

        let err = ConvergenceWaiter::default()
            .observe(&condition)
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::Validation(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = PollPolicy::attempts(1, Duration::from_millis(100)).with_jitter(0.5);
        for _ in 0..100 {
            let delay = policy.next_delay();
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_invalid_jitter_rejected() {
        let policy = PollPolicy::attempts(1, Duration::from_millis(100)).with_jitter(1.5);
        assert!(policy.validate().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_waiters_are_independent() {
        let waiter = ConvergenceWaiter::new(fast(10));
        let (first, _) = true_after(2);
        let (second, _) = true_after(3);

        let (a, b) = tokio::join!(waiter.wait_for(&first), waiter.wait_for(&second));

        assert_eq!(a.unwrap().attempts, 2);
        assert_eq!(b.unwrap().attempts, 3);
    }
}
