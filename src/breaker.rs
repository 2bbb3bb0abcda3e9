//! Core circuit breaker implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::config::{BreakerBuilder, Settings};
use crate::error::{BreakerError, BreakerResult};
use crate::hook::HookRegistry;
use crate::metrics::{Counts, MetricSink};
use crate::policy::{FailureThreshold, TripPolicy};
use crate::state::{Completion, Event, Rejection, State, StateMachine};

/// Inner state of the circuit breaker, shared between clones.
struct BreakerInner<P>
where
    P: TripPolicy,
{
    machine: Mutex<StateMachine>,
    settings: Settings,
    policy: P,
    hooks: Arc<HookRegistry>,
    metric_sink: Arc<dyn MetricSink>,
    clock: Arc<dyn Clock>,
}

/// A circuit breaker that can wrap function calls to prevent cascading failures.
///
/// Cloning is cheap and yields a handle to the same breaker.
pub struct CircuitBreaker<P = FailureThreshold>
where
    P: TripPolicy,
{
    inner: Arc<BreakerInner<P>>,
}

impl CircuitBreaker<FailureThreshold> {
    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder() -> BreakerBuilder<FailureThreshold> {
        BreakerBuilder::new()
    }
}

impl<P> CircuitBreaker<P>
where
    P: TripPolicy,
{
    pub(crate) fn new(
        settings: Settings,
        policy: P,
        hooks: Arc<HookRegistry>,
        metric_sink: Arc<dyn MetricSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let machine = StateMachine::new(clock.now(), &settings);
        let inner = BreakerInner {
            machine: Mutex::new(machine),
            settings,
            policy,
            hooks,
            metric_sink,
            clock,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Gets the current state of the circuit breaker.
    pub fn current_state(&self) -> State {
        self.inner.machine.lock().state()
    }

    /// Gets the counts of the current generation.
    pub fn current_counts(&self) -> Counts {
        self.inner.machine.lock().counts()
    }

    /// Gets the resolved settings.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Executes a function wrapped by the circuit breaker.
    ///
    /// The function is not invoked when the call is rejected. A panic inside it
    /// is counted as a failure and then keeps unwinding.
    ///
    /// That failure may trip the breaker, in which case listeners run during
    /// the unwind, and a listener that panics there aborts the process.
    pub fn call<F, T, E>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let generation = self.inner.before_call()?;

        let guard = CallGuard::new(&self.inner, generation);
        let result = f();
        guard.finish(result.is_ok());

        result.map_err(BreakerError::Operation)
    }

    /// Forces the circuit breaker to the closed state with fresh counts.
    pub fn reset(&self) {
        let mut machine = self.inner.machine.lock();
        let event = machine.reset(self.inner.clock.now(), &self.inner.settings);
        self.inner.publish(&event);
    }
}

impl<P> BreakerInner<P>
where
    P: TripPolicy,
{
    /// Admission phase: returns the generation the call is counted against.
    fn before_call(&self) -> Result<u64, Rejection> {
        let mut machine = self.machine.lock();
        let (verdict, transition) = machine.admit(self.clock.now(), &self.settings, &self.policy);
        if let Some(event) = transition {
            self.publish(&event);
        }
        drop(machine);

        if let Err(rejection) = verdict {
            #[cfg(feature = "tracing")]
            tracing::debug!(reason = rejection.as_str(), "circuit breaker rejected call");

            self.metric_sink.record_rejection(rejection);
        }

        verdict
    }

    /// Completion phase.
    fn after_call(&self, generation: u64, success: bool, duration: Duration) {
        self.metric_sink.record_call(success, duration);

        let mut machine = self.machine.lock();
        let completion = machine.complete(
            generation,
            success,
            self.clock.now(),
            &self.settings,
            &self.policy,
        );

        match completion {
            Completion::Counted(Some(event)) => self.publish(&event),
            Completion::Counted(None) => {}
            Completion::Stale => {
                #[cfg(feature = "tracing")]
                tracing::trace!(generation, success, "dropped outcome of a superseded generation");

                self.metric_sink.record_stale_outcome();
            }
        }
    }

    /// Runs with the state machine lock held.
    fn publish(&self, event: &Event) {
        #[cfg(feature = "tracing")]
        log_transition(event);

        self.metric_sink.record_state_transition(event.from, event.to);
        self.hooks.notify(event);
    }
}

#[cfg(feature = "tracing")]
fn log_transition(event: &Event) {
    match event.to {
        State::Open => tracing::warn!(
            from = event.from.as_str(),
            to = event.to.as_str(),
            reason = event.reason.as_str(),
            "circuit breaker opened"
        ),
        State::HalfOpen | State::Closed => tracing::info!(
            from = event.from.as_str(),
            to = event.to.as_str(),
            reason = event.reason.as_str(),
            "circuit breaker state changed"
        ),
    }
}

/// Reports the outcome of an admitted call exactly once.
///
/// Dropping the guard without [`CallGuard::finish`] means the call panicked or
/// its future was dropped, which counts as a failure.
struct CallGuard<'a, P>
where
    P: TripPolicy,
{
    inner: &'a BreakerInner<P>,
    generation: u64,
    started: Instant,
    finished: bool,
}

impl<'a, P> CallGuard<'a, P>
where
    P: TripPolicy,
{
    fn new(inner: &'a BreakerInner<P>, generation: u64) -> Self {
        Self {
            inner,
            generation,
            started: Instant::now(),
            finished: false,
        }
    }

    fn finish(mut self, success: bool) {
        self.finished = true;
        self.inner
            .after_call(self.generation, success, self.started.elapsed());
    }
}

impl<P> Drop for CallGuard<'_, P>
where
    P: TripPolicy,
{
    fn drop(&mut self) {
        if !self.finished {
            self.inner
                .after_call(self.generation, false, self.started.elapsed());
        }
    }
}

// Allow cloning of circuit breakers - cheap because inner state is Arc'd
impl<P> Clone for CircuitBreaker<P>
where
    P: TripPolicy,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// Implement Async support when the feature is enabled
#[cfg(feature = "async")]
impl<P> CircuitBreaker<P>
where
    P: TripPolicy,
{
    /// Executes an async function wrapped by the circuit breaker.
    ///
    /// Dropping the returned future after admission, before the operation
    /// resolves, counts as a failure.
    pub async fn call_async<F, Fut, T, E>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let generation = self.inner.before_call()?;

        let guard = CallGuard::new(&self.inner, generation);
        let result = f().await;
        guard.finish(result.is_ok());

        result.map_err(BreakerError::Operation)
    }
}
