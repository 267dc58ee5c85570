//! Bounded repetition: the only place where the crate waits.
//!
//! A [`Limiter`] is a plain value (attempt budget, time budget, delay between
//! attempts) with these ways of running an action under it:
//! * [`Limiter::repeat`] runs the action until a budget runs out and keeps
//!   every result; running out is how it ends, not a failure.
//! * [`Limiter::stall_until`] runs the action until a predicate holds, and
//!   fails with [`Error::Timeout`] once a budget runs out.
//! * [`Limiter::stall_until_some`] is the same with the acceptance built in:
//!   the first `Some` ends the loop.
//! * [`Limiter::retry`] runs the action until it stops failing; the timeout
//!   carries the last failure as its source. Only the failures the action
//!   reports as retryable are retried, any other error ends the loop.
//!
//! Attempts never overlap. Between two attempts the limiter sleeps for its
//! delay while watching a [`CancelToken`]; with no delay it still checks the
//! token and yields, so even a hot loop can be stopped.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// follows the runtime clock, so paused test time applies
use tokio::time::Instant;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::error::{BoxError, Error, Exhausted, Result};

// ------------- CancelToken -------------
/// Cooperative cancellation shared between a caller and running limiters.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<CancelState>);

#[derive(Debug)]
struct CancelState {
    cancelled: AtomicBool,
    wake: Notify,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(CancelState {
            cancelled: AtomicBool::new(false),
            wake: Notify::new(),
        }))
    }
    /// Request cancellation. Sleeping limiters wake up right away.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.wake.notify_waiters();
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
    /// Sleeps for `duration` unless cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        let woken = self.0.wake.notified();
        tokio::pin!(woken);
        // registered before the flag is read, so a cancel in between is not lost
        woken.as_mut().enable();
        self.check()?;
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = woken => Err(Error::Cancelled),
        }
    }
}

// ------------- Limiter -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limiter {
    tries: u32,
    timeout: Duration,
    delay: Duration,
}

impl Limiter {
    pub const ONCE: Limiter = Limiter::with_tries(1);
    pub const FEW: Limiter = Limiter::with_tries(5);
    pub const DOZEN: Limiter = Limiter::with_tries(12);
    pub const QUICK: Limiter = Limiter::with_timeout(Duration::from_secs(3)).delayed(Duration::from_millis(10));
    pub const SLOW: Limiter = Limiter::with_timeout(Duration::from_secs(30)).delayed(Duration::from_millis(500));

    /// At least one attempt is always made, so zero tries counts as one.
    pub const fn new(tries: u32, timeout: Duration, delay: Duration) -> Self {
        Self {
            tries: if tries == 0 { 1 } else { tries },
            timeout,
            delay,
        }
    }
    pub const fn with_tries(tries: u32) -> Self {
        Self::new(tries, Duration::MAX, Duration::ZERO)
    }
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self::new(u32::MAX, timeout, Duration::ZERO)
    }
    pub const fn delayed(self, delay: Duration) -> Self {
        Self::new(self.tries, self.timeout, delay)
    }
    pub fn tries(&self) -> u32 {
        self.tries
    }
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn exhausted(&self, attempts: u32, started: Instant) -> Option<Exhausted> {
        if attempts >= self.tries {
            Some(Exhausted::Tries(self.tries))
        } else if started.elapsed() >= self.timeout {
            Some(Exhausted::Time(self.timeout))
        } else {
            None
        }
    }
    fn timed_out(&self, exhausted: Exhausted, attempts: u32, started: Instant, source: Option<BoxError>) -> Error {
        let elapsed = started.elapsed();
        debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, %exhausted, "limiter exhausted");
        Error::Timeout {
            subject: "Limited action".to_owned(),
            exhausted,
            attempts,
            elapsed,
            source,
        }
    }
    async fn pause(&self, cancel: &CancelToken) -> Result<()> {
        if self.delay.is_zero() {
            cancel.check()?;
            tokio::task::yield_now().await;
            return Ok(());
        }
        cancel.sleep(self.delay).await
    }

    /// Runs `action` at least once and then while both budgets allow.
    pub async fn repeat<T, F, Fut>(&self, cancel: &CancelToken, mut action: F) -> Result<Vec<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut results = Vec::new();
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            results.push(action().await?);
            if self.exhausted(attempts, started).is_some() {
                break;
            }
            self.pause(cancel).await?;
        }
        trace!(attempts, "repeat finished");
        Ok(results)
    }

    /// Runs `action` until `predicate` accepts its output.
    pub async fn stall_until<T, F, Fut, P>(&self, cancel: &CancelToken, action: F, mut predicate: P) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: FnMut(&T) -> bool,
    {
        self.until(cancel, action, move |outcome| predicate(&outcome).then_some(outcome))
            .await
    }

    /// Runs `action` until it produces something.
    pub async fn stall_until_some<T, F, Fut>(&self, cancel: &CancelToken, action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        self.until(cancel, action, |outcome| outcome).await
    }

    async fn until<T, U, F, Fut, A>(&self, cancel: &CancelToken, mut action: F, mut accept: A) -> Result<U>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        A: FnMut(T) -> Option<U>,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            if let Some(accepted) = accept(action().await?) {
                return Ok(accepted);
            }
            if let Some(exhausted) = self.exhausted(attempts, started) {
                return Err(self.timed_out(exhausted, attempts, started, None));
            }
            self.pause(cancel).await?;
        }
    }

    /// Runs `action` until it succeeds. An inner `Err(E)` counts as a failed
    /// attempt; an outer error ends the loop at once.
    pub async fn retry<T, E, F, Fut>(&self, cancel: &CancelToken, action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<std::result::Result<T, E>>>,
        E: Into<BoxError>,
    {
        self.retry_with_reset(cancel, action, || {}).await
    }

    /// Like [`Limiter::retry`], calling `reset` after each failure that is
    /// followed by another attempt.
    pub async fn retry_with_reset<T, E, F, Fut, R>(&self, cancel: &CancelToken, mut action: F, mut reset: R) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<std::result::Result<T, E>>>,
        E: Into<BoxError>,
        R: FnMut(),
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            let failure: BoxError = match action().await? {
                Ok(outcome) => return Ok(outcome),
                Err(e) => e.into(),
            };
            if let Some(exhausted) = self.exhausted(attempts, started) {
                return Err(self.timed_out(exhausted, attempts, started, Some(failure)));
            }
            trace!(attempts, error = %failure, "attempt failed");
            reset();
            self.pause(cancel).await?;
        }
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::QUICK
    }
}

impl fmt::Display for Limiter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Limiter(tries: ")?;
        if self.tries == u32::MAX {
            write!(f, "unbounded")?;
        } else {
            write!(f, "{}", self.tries)?;
        }
        write!(f, ", timeout: ")?;
        if self.timeout == Duration::MAX {
            write!(f, "none")?;
        } else {
            write!(f, "{:?}", self.timeout)?;
        }
        write!(f, ", delay: {:?})", self.delay)
    }
}
