//! Retry wrapper for flaky processors
//!
//! The core never retries on its own. Collaborators that talk to slow or
//! unreliable resources wrap their processor with [`with_retry`] before
//! registering it.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::Processor;
use crate::context::{Config, ProcessingContext};
use crate::engine::Node;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Pause before the second attempt
    pub delay: Duration,
    /// Factor applied to the pause after every failed attempt
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            backoff: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, backoff: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff,
        }
    }

    /// Pause before attempt `attempt` (1-based, so attempt 2 waits `delay`).
    /// Saturates at [`Duration::MAX`].
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let factor = self.backoff.max(0.0).powi(exponent);
        Duration::try_from_secs_f64(self.delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}

pub struct Retry {
    inner: Arc<dyn Processor>,
    policy: RetryPolicy,
}

impl Processor for Retry {
    fn process(
        &self,
        node: &Node,
        ctx: &mut ProcessingContext,
        config: &Config,
    ) -> anyhow::Result<Option<Value>> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.process(node, ctx, config) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => {
                    warn!(path = %node.key(), attempts, "giving up after {e:#}");
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    let pause = self.policy.delay_before(attempt);
                    debug!(path = %node.key(), attempt, ?pause, "retrying after {e:#}");
                    thread::sleep(pause);
                }
            }
        }
    }
}

/// Wrap `processor` so failures are retried according to `policy`. The last
/// error is returned when every attempt fails.
pub fn with_retry(processor: Arc<dyn Processor>, policy: RetryPolicy) -> Arc<dyn Processor> {
    Arc::new(Retry {
        inner: processor,
        policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NodeKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    type Reply = anyhow::Result<Option<Value>>;

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO, 2.0)
    }

    fn file_node() -> Node {
        Node::new("/tmp/r/a.txt", "a.txt", NodeKind::File, 1)
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_secs(1));
        assert_eq!(policy.delay_before(3), Duration::from_secs(2));
        assert_eq!(policy.delay_before(4), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_saturates_instead_of_overflowing() {
        let steep = RetryPolicy::new(u32::MAX, Duration::from_secs(1), 10.0);
        assert_eq!(steep.delay_before(u32::MAX), Duration::MAX);
        assert_eq!(steep.delay_before(1_000), Duration::MAX);

        let flat = RetryPolicy::new(u32::MAX, Duration::from_secs(1), 0.0);
        assert_eq!(flat.delay_before(50), Duration::ZERO);
        assert_eq!(quick(5).delay_before(u32::MAX), Duration::ZERO);
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let flaky = move |_: &Node, _: &mut ProcessingContext, _: &Config| -> Reply {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("not yet");
            }
            Ok(Some(Value::from("done")))
        };

        let wrapped = with_retry(Arc::new(flaky), quick(3));
        let mut ctx = ProcessingContext::new("/tmp/r");
        let out = wrapped.process(&file_node(), &mut ctx, &Config::new()).unwrap();

        assert_eq!(out, Some(Value::from("done")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_returns_last_error_when_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let failing = move |_: &Node, _: &mut ProcessingContext, _: &Config| -> Reply {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            anyhow::bail!("attempt {n} failed")
        };

        let wrapped = with_retry(Arc::new(failing), quick(2));
        let mut ctx = ProcessingContext::new("/tmp/r");
        let err = wrapped
            .process(&file_node(), &mut ctx, &Config::new())
            .unwrap_err();

        assert_eq!(err.to_string(), "attempt 2 failed");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
