//! Circuit breaker state machine implementation.

use std::fmt::{self, Display, Formatter};
use std::time::{Instant, SystemTime};

use crate::config::{Settings, MAX_WINDOW};
use crate::metrics::Counts;
use crate::policy::TripPolicy;

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Circuit is closed and operations are allowed.
    Closed,

    /// Circuit is open and operations are rejected.
    Open,

    /// Circuit is allowing a limited number of operations to test recovery.
    HalfOpen,
}

impl State {
    /// Returns a string value for the state identifier.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a state transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// [`CircuitBreaker::reset`](crate::CircuitBreaker::reset) was invoked.
    ManuallyReset,

    /// The open period elapsed and probing resumes.
    OpenStateExpired,

    /// The trip policy fired while closed, or enough probes succeeded while half-open.
    ThresholdReached,

    /// A probe failed while half-open.
    FailedOnHalfOpen,
}

impl Reason {
    /// Returns a string value for the reason tag.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::ManuallyReset => "manually-reset",
            Reason::OpenStateExpired => "open-expired",
            Reason::ThresholdReached => "threshold-reached",
            Reason::FailedOnHalfOpen => "failed-on-half-open",
        }
    }
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Wall-clock time of the transition.
    pub when: SystemTime,
    /// State before the transition.
    pub from: State,
    /// State after the transition.
    pub to: State,
    /// Why the transition happened.
    pub reason: Reason,
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state change from {} to {} due to '{}'",
            self.from, self.to, self.reason
        )
    }
}

/// Why a call was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The breaker is open.
    Open,

    /// The breaker is half-open and the probe quota of the generation is used up.
    HalfOpenLimitExceeded,
}

impl Rejection {
    /// Returns a string value for the rejection kind.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Open => "open",
            Rejection::HalfOpenLimitExceeded => "half-open-limit-exceeded",
        }
    }
}

/// The counting window the current [`Counts`] belong to.
///
/// The id is the token handed out on admission; the expiry only decides when
/// the window rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Generation {
    pub(crate) id: u64,
    pub(crate) expires_at: Instant,
}

/// Result of reporting an outcome to the state machine.
#[derive(Debug)]
pub(crate) enum Completion {
    /// The outcome belongs to a superseded generation and was dropped.
    Stale,

    /// The outcome was counted, possibly causing a transition.
    Counted(Option<Event>),
}

/// State, counts and generation of a single breaker.
///
/// Holds no lock and does no I/O: the caller serializes access and publishes
/// the returned events.
#[derive(Debug)]
pub(crate) struct StateMachine {
    state: State,
    counts: Counts,
    generation: Generation,
}

impl StateMachine {
    /// Creates a closed state machine whose first generation starts at `now`.
    pub(crate) fn new(now: Instant, settings: &Settings) -> Self {
        let mut machine = Self {
            state: State::Closed,
            counts: Counts::default(),
            generation: Generation {
                id: 0,
                expires_at: now,
            },
        };
        machine.next_generation(now, settings);
        machine
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn counts(&self) -> Counts {
        self.counts
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> Generation {
        self.generation
    }

    /// Re-evaluates the state at `now` and decides whether one more call may run.
    ///
    /// On admission the request is counted and the current generation id is returned.
    pub(crate) fn admit<P>(
        &mut self,
        now: Instant,
        settings: &Settings,
        policy: &P,
    ) -> (Result<u64, Rejection>, Option<Event>)
    where
        P: TripPolicy + ?Sized,
    {
        let transition = match self.state {
            State::Open if now > self.generation.expires_at => {
                Some(self.transition(now, State::HalfOpen, Reason::OpenStateExpired, settings))
            }
            // Completion closes the breaker first; kept so admission alone
            // never admits past the success threshold.
            State::HalfOpen if self.counts.successes() >= settings.success_threshold => {
                Some(self.transition(now, State::Closed, Reason::ThresholdReached, settings))
            }
            State::Closed if policy.should_trip(&self.counts, settings) => {
                Some(self.transition(now, State::Open, Reason::ThresholdReached, settings))
            }
            _ => None,
        };

        // Keeps closed and half-open windows rolling without a transition.
        if now > self.generation.expires_at {
            self.next_generation(now, settings);
        }

        let verdict = match self.state {
            State::Open => Err(Rejection::Open),
            State::HalfOpen if self.counts.requests() >= settings.half_open_request_limit => {
                Err(Rejection::HalfOpenLimitExceeded)
            }
            _ => {
                self.counts.record_request();
                Ok(self.generation.id)
            }
        };

        (verdict, transition)
    }

    /// Records the outcome of a call admitted in generation `token`.
    pub(crate) fn complete<P>(
        &mut self,
        token: u64,
        success: bool,
        now: Instant,
        settings: &Settings,
        policy: &P,
    ) -> Completion
    where
        P: TripPolicy + ?Sized,
    {
        if token != self.generation.id {
            return Completion::Stale;
        }

        if success {
            self.counts.record_success();
        } else {
            self.counts.record_failure();
        }

        let transition = match self.state {
            State::HalfOpen if !success => {
                Some(self.transition(now, State::Open, Reason::FailedOnHalfOpen, settings))
            }
            State::HalfOpen if self.counts.successes() >= settings.success_threshold => {
                Some(self.transition(now, State::Closed, Reason::ThresholdReached, settings))
            }
            State::Closed if policy.should_trip(&self.counts, settings) => {
                Some(self.transition(now, State::Open, Reason::ThresholdReached, settings))
            }
            _ => None,
        };

        Completion::Counted(transition)
    }

    /// Forces the closed state, whatever the current one is.
    pub(crate) fn reset(&mut self, now: Instant, settings: &Settings) -> Event {
        self.transition(now, State::Closed, Reason::ManuallyReset, settings)
    }

    fn transition(&mut self, now: Instant, to: State, reason: Reason, settings: &Settings) -> Event {
        let from = self.state;
        let generation = self.following_generation(to, now, settings);
        self.state = to;
        self.start_generation(generation);

        Event {
            when: SystemTime::now(),
            from,
            to,
            reason,
        }
    }

    fn next_generation(&mut self, now: Instant, settings: &Settings) {
        let generation = self.following_generation(self.state, now, settings);
        self.start_generation(generation);
    }

    fn start_generation(&mut self, generation: Generation) {
        self.counts.reset();
        self.generation = generation;
    }

    /// The generation that starts at `now` in `state`.
    fn following_generation(&self, state: State, now: Instant, settings: &Settings) -> Generation {
        let window = match state {
            State::Open => settings.open_state_expiry,
            State::HalfOpen | State::Closed => settings.generation_interval,
        };
        // Saturates; validated settings stay well below the limit.
        let expires_at = now
            .checked_add(window)
            .or_else(|| now.checked_add(MAX_WINDOW))
            .unwrap_or(now);

        Generation {
            id: self.generation.id.wrapping_add(1),
            expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FailureThreshold;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            failure_threshold: 2,
            success_threshold: 2,
            half_open_request_limit: 3,
            generation_interval: Duration::from_secs(10),
            open_state_expiry: Duration::from_secs(5),
        }
    }

    fn trip(machine: &mut StateMachine, now: Instant, settings: &Settings) {
        for _ in 0..settings.failure_threshold {
            let (verdict, _) = machine.admit(now, settings, &FailureThreshold);
            let token = verdict.expect("closed breaker admits");
            machine.complete(token, false, now, settings, &FailureThreshold);
        }
        assert_eq!(machine.state(), State::Open);
    }

    #[test]
    fn first_generation_starts_at_construction() {
        let now = Instant::now();
        let settings = settings();
        let machine = StateMachine::new(now, &settings);

        assert_eq!(machine.state(), State::Closed);
        assert_eq!(machine.counts(), Counts::default());
        assert_eq!(machine.generation().expires_at, now + settings.generation_interval);
    }

    #[test]
    fn every_transition_starts_a_new_generation() {
        let now = Instant::now();
        let settings = settings();
        let mut machine = StateMachine::new(now, &settings);
        let before = machine.generation().id;

        trip(&mut machine, now, &settings);

        let generation = machine.generation();
        assert_ne!(generation.id, before);
        assert_eq!(generation.expires_at, now + settings.open_state_expiry);
        assert_eq!(machine.counts(), Counts::default());
    }

    #[test]
    fn closed_window_rolls_over_without_transition() {
        let now = Instant::now();
        let settings = settings();
        let mut machine = StateMachine::new(now, &settings);

        let (verdict, _) = machine.admit(now, &settings, &FailureThreshold);
        let token = verdict.unwrap();
        machine.complete(token, false, now, &settings, &FailureThreshold);
        assert_eq!(machine.counts().failures(), 1);

        let later = now + settings.generation_interval + Duration::from_millis(1);
        let (verdict, transition) = machine.admit(later, &settings, &FailureThreshold);

        assert!(transition.is_none());
        assert_ne!(verdict.unwrap(), token);
        assert_eq!(machine.state(), State::Closed);
        assert_eq!(machine.counts(), Counts::new(1, 0, 0));
    }

    #[test]
    fn open_expires_into_half_open_on_admission() {
        let now = Instant::now();
        let settings = settings();
        let mut machine = StateMachine::new(now, &settings);
        trip(&mut machine, now, &settings);

        let (verdict, transition) = machine.admit(now, &settings, &FailureThreshold);
        assert_eq!(verdict, Err(Rejection::Open));
        assert!(transition.is_none());

        let later = now + settings.open_state_expiry + Duration::from_millis(1);
        let (verdict, transition) = machine.admit(later, &settings, &FailureThreshold);
        assert!(verdict.is_ok());

        let event = transition.expect("open state expired");
        assert_eq!(event.from, State::Open);
        assert_eq!(event.to, State::HalfOpen);
        assert_eq!(event.reason, Reason::OpenStateExpired);
    }

    #[test]
    fn stale_outcome_is_not_counted() {
        let now = Instant::now();
        let settings = settings();
        let mut machine = StateMachine::new(now, &settings);

        let (verdict, _) = machine.admit(now, &settings, &FailureThreshold);
        let token = verdict.unwrap();
        machine.reset(now, &settings);

        let completion = machine.complete(token, false, now, &settings, &FailureThreshold);
        assert!(matches!(completion, Completion::Stale));
        assert_eq!(machine.counts(), Counts::default());
    }

    #[test]
    fn reset_reports_the_previous_state() {
        let now = Instant::now();
        let settings = settings();
        let mut machine = StateMachine::new(now, &settings);
        trip(&mut machine, now, &settings);

        let event = machine.reset(now, &settings);
        assert_eq!(event.from, State::Open);
        assert_eq!(event.to, State::Closed);
        assert_eq!(event.reason, Reason::ManuallyReset);
        assert_eq!(machine.state(), State::Closed);
    }

    #[test]
    fn labels_match_the_reason_tags() {
        assert_eq!(State::HalfOpen.to_string(), "half-open");
        assert_eq!(Reason::ManuallyReset.as_str(), "manually-reset");
        assert_eq!(Reason::OpenStateExpired.as_str(), "open-expired");
        assert_eq!(Reason::ThresholdReached.as_str(), "threshold-reached");
        assert_eq!(Reason::FailedOnHalfOpen.as_str(), "failed-on-half-open");
    }

    #[test]
    fn longest_window_transitions_cleanly() {
        let now = Instant::now();
        let settings = Settings {
            failure_threshold: 1,
            open_state_expiry: MAX_WINDOW,
            generation_interval: MAX_WINDOW,
            ..settings()
        };
        let mut machine = StateMachine::new(now, &settings);
        let before = machine.generation().id;

        trip(&mut machine, now, &settings);

        assert_eq!(machine.counts(), Counts::default());
        assert_ne!(machine.generation().id, before);
        assert_eq!(machine.generation().expires_at, now + MAX_WINDOW);
    }
}
