//! Trip policies deciding when a closed circuit breaker opens.

use crate::config::Settings;
use crate::metrics::Counts;

/// A policy that determines when to trip a closed circuit breaker.
///
/// Evaluated against the counts of the current generation, both before a call
/// is admitted and after its outcome is recorded. Implementations run while the
/// breaker's lock is held and must be cheap.
///
/// Any `Fn(&Counts) -> bool` is a policy too.
pub trait TripPolicy: Send + Sync + 'static {
    /// Determines if the circuit should trip open.
    fn should_trip(&self, counts: &Counts, settings: &Settings) -> bool;
}

/// Trips once the generation has seen `failure_threshold` failures.
///
/// This is the default policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailureThreshold;

impl TripPolicy for FailureThreshold {
    fn should_trip(&self, counts: &Counts, settings: &Settings) -> bool {
        counts.failures() >= settings.failure_threshold
    }
}

/// Trips when the share of failed calls reaches a ratio.
#[derive(Debug, Clone, Copy)]
pub struct FailureRatio {
    ratio: f64,
    min_calls: u64,
}

impl FailureRatio {
    /// Creates a ratio policy.
    ///
    /// `ratio` is clamped to `0.0..=1.0`. The policy stays quiet until at least
    /// `min_calls` calls have completed in the generation.
    pub fn new(ratio: f64, min_calls: u64) -> Self {
        Self {
            ratio: ratio.clamp(0.0, 1.0),
            min_calls,
        }
    }
}

impl TripPolicy for FailureRatio {
    fn should_trip(&self, counts: &Counts, _settings: &Settings) -> bool {
        let completed = counts.successes() + counts.failures();
        completed > 0 && completed >= self.min_calls && counts.failure_ratio() >= self.ratio
    }
}

impl<F> TripPolicy for F
where
    F: Fn(&Counts) -> bool + Send + Sync + 'static,
{
    fn should_trip(&self, counts: &Counts, _settings: &Settings) -> bool {
        self(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_policy_reads_the_settings() {
        let settings = Settings {
            failure_threshold: 3,
            ..Settings::default()
        };

        assert!(!FailureThreshold.should_trip(&Counts::new(5, 3, 2), &settings));
        assert!(FailureThreshold.should_trip(&Counts::new(3, 0, 3), &settings));
    }

    #[test]
    fn ratio_policy_waits_for_min_calls() {
        let settings = Settings::default();
        let policy = FailureRatio::new(0.5, 4);

        assert!(!policy.should_trip(&Counts::new(3, 0, 3), &settings));
        assert!(policy.should_trip(&Counts::new(4, 2, 2), &settings));
        assert!(!policy.should_trip(&Counts::new(4, 3, 1), &settings));
    }

    #[test]
    fn closures_are_policies() {
        let policy = |counts: &Counts| counts.requests() > 1;
        assert!(policy.should_trip(&Counts::new(2, 0, 0), &Settings::default()));
    }
}
