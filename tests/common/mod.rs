//! Shared utilities for the integration tests.

#![allow(dead_code)]

use generational_breaker::{Event, Reason, State};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

// Custom error type that implements Error trait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError(pub String);

impl TestError {
    pub fn new(msg: &str) -> Self {
        TestError(msg.to_string())
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Test error: {}", self.0)
    }
}

impl Error for TestError {}

pub fn succeed() -> Result<&'static str, TestError> {
    Ok("success")
}

pub fn fail() -> Result<&'static str, TestError> {
    Err(TestError::new("failure"))
}

/// Collects every state change a breaker reports.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener that appends to this log.
    pub fn listener(&self) -> impl Fn(&Event) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &Event| events.lock().push(*event)
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn last(&self) -> Option<Event> {
        self.events.lock().last().copied()
    }

    /// `(from, to, reason)` of every recorded event.
    pub fn transitions(&self) -> Vec<(State, State, Reason)> {
        self.events
            .lock()
            .iter()
            .map(|event| (event.from, event.to, event.reason))
            .collect()
    }
}
