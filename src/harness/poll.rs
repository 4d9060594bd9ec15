//! Condition polling - wait for asynchronous editor state with a deadline
//!
//! The editor settles state on its own schedule (vegetation placement,
//! dependency updates), so assertions poll a predicate until it holds or the
//! timeout expires.
//!
//! Cadence: the predicate is evaluated at `start + k * interval` for k = 0, 1,
//! 2, ... but only at instants strictly before the deadline. When the next
//! slot would land on or after the deadline the poller sleeps until the
//! deadline and reports `false`. A 2.0s timeout with a 0.5s interval therefore
//! evaluates exactly four times (0, 0.5, 1.0, 1.5).
//!
//! A slow predicate does not push the schedule back: slots it overran are
//! skipped, and an evaluation that ends past the deadline returns at once.

use std::thread;
use std::time::{Duration, Instant};

use crate::constants::{
    DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, MAX_POLL_TIMEOUT, MIN_POLL_INTERVAL,
};

/// Time source used by the poller
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep_until(&self, deadline: Instant);
}

/// Wall clock with real sleeps
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}

/// Timeout and cadence for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollSpec {
    /// Interval is clamped to at least 1ms, both to at most an hour
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout: timeout.min(MAX_POLL_TIMEOUT),
            interval: interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_TIMEOUT),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }

    pub fn from_secs_f64(timeout: f64, interval: f64) -> Self {
        Self::new(secs(timeout), secs(interval))
    }
}

/// Negative or NaN seconds collapse to zero, overlarge ones saturate
fn secs(value: f64) -> Duration {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) => duration,
        Err(_) if value > 0.0 => Duration::MAX,
        Err(_) => Duration::ZERO,
    }
}

/// First slot `start + k * interval` strictly after `now`
fn next_slot(start: Instant, now: Instant, interval: Duration) -> Option<Instant> {
    let elapsed = now.saturating_duration_since(start);
    let k = elapsed.as_nanos() / interval.as_nanos() + 1;
    let offset = u32::try_from(k)
        .ok()
        .and_then(|k| interval.checked_mul(k))?;
    start.checked_add(offset)
}

/// What happened during a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub satisfied: bool,
    /// Number of predicate evaluations
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Evaluates predicates against a live system until they hold or time runs out
#[derive(Debug, Clone)]
pub struct ConditionPoller<C: Clock = SystemClock> {
    clock: C,
    default_interval: Duration,
    /// Used by callers that do not name a timeout
    default_timeout: Duration,
}

impl Default for ConditionPoller<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> ConditionPoller<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            default_interval: DEFAULT_POLL_INTERVAL,
            default_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn default_interval(&self) -> Duration {
        self.default_interval
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout.min(MAX_POLL_TIMEOUT);
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Poll with the default interval; `Ok(false)` on timeout
    pub fn wait_for_condition<E>(
        &self,
        predicate: impl FnMut() -> Result<bool, E>,
        timeout: Duration,
    ) -> Result<bool, E> {
        self.wait_for_condition_with(predicate, PollSpec::new(timeout, self.default_interval))
    }

    pub fn wait_for_condition_with<E>(
        &self,
        predicate: impl FnMut() -> Result<bool, E>,
        spec: PollSpec,
    ) -> Result<bool, E> {
        self.poll(predicate, spec).map(|outcome| outcome.satisfied)
    }

    /// Run the poll loop. A predicate error ends the wait immediately.
    pub fn poll<E>(
        &self,
        mut predicate: impl FnMut() -> Result<bool, E>,
        spec: PollSpec,
    ) -> Result<PollOutcome, E> {
        let interval = spec.interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_TIMEOUT);
        let start = self.clock.now();
        // An unrepresentable deadline counts as already passed
        let deadline = start
            .checked_add(spec.timeout.min(MAX_POLL_TIMEOUT))
            .unwrap_or(start);
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            if predicate()? {
                return Ok(PollOutcome {
                    satisfied: true,
                    attempts,
                    elapsed: self.clock.now().saturating_duration_since(start),
                });
            }

            let now = self.clock.now();
            if now >= deadline {
                return Ok(PollOutcome {
                    satisfied: false,
                    attempts,
                    elapsed: now.saturating_duration_since(start),
                });
            }

            match next_slot(start, now, interval) {
                Some(next) if next < deadline => self.clock.sleep_until(next),
                _ => {
                    self.clock.sleep_until(deadline);
                    return Ok(PollOutcome {
                        satisfied: false,
                        attempts,
                        elapsed: self.clock.now().saturating_duration_since(start),
                    });
                }
            }
        }
    }
}

/// Convenience wrapper over a system-clock poller with the default interval
pub fn wait_for_condition<E>(
    predicate: impl FnMut() -> Result<bool, E>,
    timeout: Duration,
) -> Result<bool, E> {
    ConditionPoller::default().wait_for_condition(predicate, timeout)
}
