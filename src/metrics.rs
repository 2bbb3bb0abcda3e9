//! Generation counts and metric sinks for circuit breakers.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use crate::state::{Rejection, State};

/// Trait for metrics sinks that can receive circuit breaker events.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a state transition event.
    fn record_state_transition(&self, from: State, to: State);

    /// Records a call that was rejected without being invoked.
    fn record_rejection(&self, rejection: Rejection);

    /// Records a call result.
    fn record_call(&self, success: bool, duration: Duration);

    /// Records an outcome dropped because its generation was superseded.
    fn record_stale_outcome(&self);
}

/// A null metrics sink that discards all events.
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _from: State, _to: State) {}
    fn record_rejection(&self, _rejection: Rejection) {}
    fn record_call(&self, _success: bool, _duration: Duration) {}
    fn record_stale_outcome(&self) {}
}

/// Requests and outcomes seen during the current generation.
///
/// `requests` counts admitted calls, including those still running, so it can
/// run ahead of `successes + failures`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    requests: u64,
    successes: u64,
    failures: u64,
}

impl Counts {
    /// Creates a counts snapshot from raw values.
    pub fn new(requests: u64, successes: u64, failures: u64) -> Self {
        Self {
            requests,
            successes,
            failures,
        }
    }

    /// Gets the number of admitted calls.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Gets the number of successful calls.
    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Gets the number of failed calls.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Gets the share of completed calls that failed, `0.0` when none completed.
    pub fn failure_ratio(&self) -> f64 {
        let completed = self.successes + self.failures;
        if completed == 0 {
            return 0.0;
        }

        self.failures as f64 / completed as f64
    }

    pub(crate) fn record_request(&mut self) {
        self.requests += 1;
    }

    pub(crate) fn record_success(&mut self) {
        self.successes += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Display for Counts {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "request: {}, success: {}, failure: {}",
            self.requests, self.successes, self.failures
        )
    }
}

#[cfg(feature = "prometheus")]
mod prom {
    use std::time::Duration;

    use prometheus_client::metrics::counter::Counter;
    use prometheus_client::metrics::family::Family;
    use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
    use prometheus_client::registry::Registry;

    use super::MetricSink;
    use crate::state::{Rejection, State};

    type Labels = Vec<(String, String)>;

    /// A metric sink backed by `prometheus-client`.
    ///
    /// Register one sink per breaker; use a sub-registry with a distinguishing
    /// label when several breakers share a registry.
    #[derive(Clone)]
    pub struct PrometheusSink {
        transitions: Family<Labels, Counter>,
        rejections: Family<Labels, Counter>,
        calls: Family<Labels, Counter>,
        stale_outcomes: Counter,
        call_duration: Histogram,
    }

    impl PrometheusSink {
        /// Creates the sink and registers its metrics in `registry`.
        pub fn new(registry: &mut Registry) -> Self {
            let sink = Self {
                transitions: Family::default(),
                rejections: Family::default(),
                calls: Family::default(),
                stale_outcomes: Counter::default(),
                call_duration: Histogram::new(exponential_buckets(0.0005, 2.0, 16)),
            };

            registry.register(
                "circuit_breaker_transitions",
                "State transitions of the circuit breaker",
                sink.transitions.clone(),
            );
            registry.register(
                "circuit_breaker_rejections",
                "Calls rejected without being invoked",
                sink.rejections.clone(),
            );
            registry.register(
                "circuit_breaker_calls",
                "Calls invoked through the circuit breaker",
                sink.calls.clone(),
            );
            registry.register(
                "circuit_breaker_stale_outcomes",
                "Outcomes dropped because their generation was superseded",
                sink.stale_outcomes.clone(),
            );
            registry.register(
                "circuit_breaker_call_duration_seconds",
                "Duration of invoked calls",
                sink.call_duration.clone(),
            );

            sink
        }
    }

    impl MetricSink for PrometheusSink {
        fn record_state_transition(&self, from: State, to: State) {
            self.transitions
                .get_or_create(&vec![
                    ("from".to_owned(), from.as_str().to_owned()),
                    ("to".to_owned(), to.as_str().to_owned()),
                ])
                .inc();
        }

        fn record_rejection(&self, rejection: Rejection) {
            self.rejections
                .get_or_create(&vec![("reason".to_owned(), rejection.as_str().to_owned())])
                .inc();
        }

        fn record_call(&self, success: bool, duration: Duration) {
            let outcome = if success { "success" } else { "failure" };
            self.calls
                .get_or_create(&vec![("outcome".to_owned(), outcome.to_owned())])
                .inc();
            self.call_duration.observe(duration.as_secs_f64());
        }

        fn record_stale_outcome(&self) {
            self.stale_outcomes.inc();
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use prometheus_client::encoding::text::encode;

        #[test]
        fn encodes_recorded_events() {
            let mut registry = Registry::default();
            let sink = PrometheusSink::new(&mut registry);

            sink.record_state_transition(State::Closed, State::Open);
            sink.record_rejection(Rejection::Open);
            sink.record_call(false, Duration::from_millis(3));
            sink.record_stale_outcome();

            let mut output = String::new();
            encode(&mut output, &registry).unwrap();

            assert!(output.contains("circuit_breaker_transitions_total"));
            assert!(output.contains("to=\"open\""));
            assert!(output.contains("reason=\"open\""));
            assert!(output.contains("outcome=\"failure\""));
            assert!(output.contains("circuit_breaker_stale_outcomes_total 1"));
        }
    }
}

#[cfg(feature = "prometheus")]
pub use self::prom::PrometheusSink;
