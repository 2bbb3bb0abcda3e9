//! Error types for the circuit breaker library.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use crate::state::Rejection;

/// Result type for circuit breaker operations.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Error type for circuit breaker operations.
#[derive(Debug, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The circuit is open, calls are not permitted.
    Open,

    /// The circuit is half-open and its probe quota is used up.
    HalfOpenLimitExceeded,

    /// The underlying operation failed.
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Whether the call was rejected without invoking the operation.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, BreakerError::Operation(_))
    }

    /// Returns the operation's own error, if it ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Open | BreakerError::HalfOpenLimitExceeded => None,
        }
    }
}

impl<E> From<Rejection> for BreakerError<E> {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Open => BreakerError::Open,
            Rejection::HalfOpenLimitExceeded => BreakerError::HalfOpenLimitExceeded,
        }
    }
}

impl<E> Display for BreakerError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => write!(f, "Circuit breaker is open"),
            BreakerError::HalfOpenLimitExceeded => {
                write!(f, "Circuit breaker is half-open and its request limit is exceeded")
            }
            BreakerError::Operation(e) => Display::fmt(e, f),
        }
    }
}

impl<E: Error + 'static> Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Open | BreakerError::HalfOpenLimitExceeded => None,
        }
    }
}

/// Invalid circuit breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A half-open breaker could never collect enough successes to close.
    HalfOpenLimitBelowSuccessThreshold {
        /// Configured half-open request limit.
        limit: u64,
        /// Configured success threshold.
        threshold: u64,
    },

    /// A generation interval or open expiry exceeds [`MAX_WINDOW`](crate::MAX_WINDOW).
    WindowTooLong {
        /// The offending window.
        window: Duration,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::HalfOpenLimitBelowSuccessThreshold { limit, threshold } => write!(
                f,
                "half-open request limit ({}) must not be below the success threshold ({})",
                limit, threshold
            ),
            ConfigError::WindowTooLong { window } => write!(
                f,
                "window of {:?} exceeds the longest supported window ({:?})",
                window,
                crate::config::MAX_WINDOW
            ),
        }
    }
}

impl Error for ConfigError {}
