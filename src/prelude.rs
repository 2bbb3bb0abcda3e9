//! Re-exports common types for convenient usage.
//!
//! # Example
//! ```rust,no_run
//! use generational_breaker::prelude::*;
//!
//! let breaker = CircuitBreaker::builder().build();
//! let _ = breaker.call(|| Ok::<_, std::io::Error>(()));
//! ```

pub use crate::breaker::CircuitBreaker;
pub use crate::error::{BreakerError, BreakerResult};
pub use crate::policy::TripPolicy;
pub use crate::state::{Event, Reason, State};
