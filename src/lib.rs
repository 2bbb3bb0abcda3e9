//! # generational-breaker
//!
//! A thread-safe circuit breaker whose counters live in time-boxed
//! *generations*.
//!
//! ## What is a Circuit Breaker?
//!
//! The Circuit Breaker pattern stops a caller from hammering an operation that
//! keeps failing. It operates in three states:
//!
//! - **Closed**: Normal operation. Calls pass through and outcomes are counted.
//! - **Open**: Calls are immediately rejected without invoking the operation.
//! - **Half-Open**: Once the open period expires, a limited number of probe
//!   calls are admitted to check whether the downstream has recovered.
//!
//! ## Generations
//!
//! Requests, successes and failures are counted per generation. A generation
//! ends on every state change and whenever a closed or half-open window
//! expires; its counts are then zeroed. An outcome that arrives after its
//! generation ended is dropped, so a slow call cannot pollute fresh counts.
//!
//! ## Basic Usage
//!
//! ```rust
//! use generational_breaker::{BreakerError, CircuitBreaker, Event, State};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::builder()
//!     .failure_threshold(3)
//!     .success_threshold(5)
//!     .half_open_request_limit(10)
//!     .generation_interval(Duration::from_secs(2))
//!     .open_state_expiry(Duration::from_secs(2))
//!     .on_state_change(|event: &Event| println!("{}", event))
//!     .build();
//!
//! for _ in 0..3 {
//!     let result: Result<(), _> = breaker.call(|| Err("service unavailable"));
//!     assert_eq!(result, Err(BreakerError::Operation("service unavailable")));
//! }
//! assert_eq!(breaker.current_state(), State::Open);
//!
//! match breaker.call(|| Ok::<_, &str>("never invoked")) {
//!     Err(BreakerError::Open) => println!("Circuit is open, call was prevented"),
//!     other => panic!("unexpected {:?}", other),
//! }
//!
//! breaker.reset();
//! assert_eq!(breaker.current_state(), State::Closed);
//! ```
//!
//! ## Features
//!
//! - `tracing` - Log state changes and rejections with `tracing` (default)
//! - `async` - [`CircuitBreaker::call_async`] for futures
//! - `prometheus` - `PrometheusSink` backed by `prometheus-client`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
pub mod clock;
mod config;
mod error;
mod hook;
mod metrics;
mod policy;
pub mod prelude;
mod state;

// Re-exports
pub use breaker::CircuitBreaker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BreakerBuilder, Settings, DEFAULT_FAILURE_THRESHOLD, DEFAULT_GENERATION_INTERVAL,
    DEFAULT_HALF_OPEN_REQUEST_LIMIT, DEFAULT_OPEN_STATE_EXPIRY, DEFAULT_SUCCESS_THRESHOLD,
    MAX_WINDOW,
};
pub use error::{BreakerError, BreakerResult, ConfigError};
pub use hook::{HookRegistry, StateListener};
#[cfg(feature = "prometheus")]
pub use metrics::PrometheusSink;
pub use metrics::{Counts, MetricSink, NullMetricSink};
pub use policy::{FailureRatio, FailureThreshold, TripPolicy};
pub use state::{Event, Reason, Rejection, State};
