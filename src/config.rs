//! Configuration for circuit breakers.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::hook::{HookRegistry, StateListener};
use crate::metrics::{MetricSink, NullMetricSink};
use crate::policy::{FailureThreshold, TripPolicy};

/// Default time an open breaker blocks calls before probing.
pub const DEFAULT_OPEN_STATE_EXPIRY: Duration = Duration::from_secs(60);

/// Default failures in one generation that trip a closed breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u64 = 100;

/// Default successful probes that close a half-open breaker.
pub const DEFAULT_SUCCESS_THRESHOLD: u64 = 100;

/// Default length of a closed or half-open counting window.
pub const DEFAULT_GENERATION_INTERVAL: Duration = Duration::from_secs(10);

/// Default number of probes admitted per half-open generation.
pub const DEFAULT_HALF_OPEN_REQUEST_LIMIT: u64 = 200;

/// Longest accepted generation interval or open expiry, one hundred years.
pub const MAX_WINDOW: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Thresholds and windows of a circuit breaker.
///
/// A zero field stands for "use the default"; see [`Settings::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Failures in one closed generation that trip the breaker.
    pub failure_threshold: u64,
    /// Successes in one half-open generation that close the breaker.
    pub success_threshold: u64,
    /// Calls admitted per half-open generation.
    pub half_open_request_limit: u64,
    /// Length of a closed or half-open counting window.
    pub generation_interval: Duration,
    /// How long the breaker stays open before probing.
    pub open_state_expiry: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            half_open_request_limit: DEFAULT_HALF_OPEN_REQUEST_LIMIT,
            generation_interval: DEFAULT_GENERATION_INTERVAL,
            open_state_expiry: DEFAULT_OPEN_STATE_EXPIRY,
        }
    }
}

impl Settings {
    /// Replaces every zero field with its default.
    pub fn resolve(mut self) -> Self {
        let defaults = Self::default();

        if self.failure_threshold == 0 {
            self.failure_threshold = defaults.failure_threshold;
        }
        if self.success_threshold == 0 {
            self.success_threshold = defaults.success_threshold;
        }
        if self.half_open_request_limit == 0 {
            self.half_open_request_limit = defaults.half_open_request_limit;
        }
        if self.generation_interval.is_zero() {
            self.generation_interval = defaults.generation_interval;
        }
        if self.open_state_expiry.is_zero() {
            self.open_state_expiry = defaults.open_state_expiry;
        }

        self
    }

    /// Checks that a half-open breaker can actually close and that both
    /// windows fit in [`MAX_WINDOW`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for window in [self.generation_interval, self.open_state_expiry] {
            if window > MAX_WINDOW {
                return Err(ConfigError::WindowTooLong { window });
            }
        }

        if self.half_open_request_limit < self.success_threshold {
            return Err(ConfigError::HalfOpenLimitBelowSuccessThreshold {
                limit: self.half_open_request_limit,
                threshold: self.success_threshold,
            });
        }

        Ok(())
    }
}

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder<P = FailureThreshold>
where
    P: TripPolicy,
{
    settings: Settings,
    policy: P,
    hook_registry: Arc<HookRegistry>,
    metric_sink: Arc<dyn MetricSink>,
    clock: Arc<dyn Clock>,
}

impl Default for BreakerBuilder<FailureThreshold> {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerBuilder<FailureThreshold> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            policy: FailureThreshold,
            hook_registry: Arc::new(HookRegistry::new()),
            metric_sink: Arc::new(NullMetricSink),
            clock: Arc::new(SystemClock),
        }
    }
}

impl<P> BreakerBuilder<P>
where
    P: TripPolicy,
{
    /// Sets the failures per generation that trip a closed breaker.
    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.settings.failure_threshold = threshold;
        self
    }

    /// Sets the successes per generation that close a half-open breaker.
    pub fn success_threshold(mut self, threshold: u64) -> Self {
        self.settings.success_threshold = threshold;
        self
    }

    /// Sets the number of probes admitted per half-open generation.
    pub fn half_open_request_limit(mut self, limit: u64) -> Self {
        self.settings.half_open_request_limit = limit;
        self
    }

    /// Sets the length of the closed and half-open counting windows.
    pub fn generation_interval(mut self, interval: Duration) -> Self {
        self.settings.generation_interval = interval;
        self
    }

    /// Sets how long the breaker stays open before probing.
    pub fn open_state_expiry(mut self, expiry: Duration) -> Self {
        self.settings.open_state_expiry = expiry;
        self
    }

    /// Replaces all thresholds and windows at once.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the trip policy.
    pub fn trip_policy<Q>(self, policy: Q) -> BreakerBuilder<Q>
    where
        Q: TripPolicy,
    {
        BreakerBuilder {
            settings: self.settings,
            policy,
            hook_registry: self.hook_registry,
            metric_sink: self.metric_sink,
            clock: self.clock,
        }
    }

    /// Adds a listener for state transitions.
    pub fn on_state_change<L>(self, listener: L) -> Self
    where
        L: StateListener,
    {
        self.hook_registry.add_listener(listener);
        self
    }

    /// Sets a hook registry for the circuit breaker.
    ///
    /// Listeners added earlier through [`on_state_change`](Self::on_state_change)
    /// are moved into `hooks`, after the ones it already holds.
    pub fn hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        if !Arc::ptr_eq(&self.hook_registry, &hooks) {
            hooks.append(&self.hook_registry);
        }
        self.hook_registry = hooks;
        self
    }

    /// Sets a metric sink for the circuit breaker.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets the time source for generation expiry.
    pub fn clock<C: Clock>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Builds the circuit breaker, reporting invalid settings as an error.
    pub fn try_build(self) -> Result<CircuitBreaker<P>, ConfigError> {
        let settings = self.settings.resolve();
        settings.validate()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            failure_threshold = settings.failure_threshold,
            success_threshold = settings.success_threshold,
            half_open_request_limit = settings.half_open_request_limit,
            generation_interval = ?settings.generation_interval,
            open_state_expiry = ?settings.open_state_expiry,
            "circuit breaker created"
        );

        Ok(CircuitBreaker::new(
            settings,
            self.policy,
            self.hook_registry,
            self.metric_sink,
            self.clock,
        ))
    }

    /// Builds the circuit breaker.
    ///
    /// # Panics
    ///
    /// Panics when the half-open request limit is below the success threshold,
    /// since such a breaker could never close again, or when a window exceeds
    /// [`MAX_WINDOW`].
    pub fn build(self) -> CircuitBreaker<P> {
        match self.try_build() {
            Ok(breaker) => breaker,
            Err(err) => panic!("{}", err),
        }
    }
}
