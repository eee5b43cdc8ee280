//! Captured failures.

use std::any::Any;

use serde::{Deserialize, Serialize};

/// A failure observed while a task's scope was exiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Type of the error, or `"panic"`
    pub kind: String,

    /// Short message
    pub value: String,

    /// Full formatted trace
    pub trace: String,
}

impl Failure {
    /// Capture an error
    ///
    /// The trace is the error's `Debug` output, which for `anyhow` errors
    /// includes the cause chain and, when enabled, a backtrace.
    pub fn from_error<E: std::fmt::Display + std::fmt::Debug + ?Sized>(error: &E) -> Self {
        Self {
            kind: std::any::type_name::<E>().to_string(),
            value: error.to_string(),
            trace: format!("{error:?}"),
        }
    }

    /// Capture a `std::error::Error` and its chain of sources
    pub fn from_std_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            trace.push_str("\ncaused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        Self {
            kind: "std::error::Error".to_string(),
            value: error.to_string(),
            trace,
        }
    }

    /// Capture a panic payload
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "Box<dyn Any>".to_string());
        Self::panic(message)
    }

    /// A panic observed without its payload, e.g. from a drop guard
    pub fn unwinding() -> Self {
        Self::panic("thread panicked".to_string())
    }

    /// A scope left without being finished, e.g. by an early `?` return
    pub fn abandoned() -> Self {
        let message = "scope dropped before finish".to_string();
        Self {
            kind: "abandoned".to_string(),
            trace: format!("abandoned: {message}"),
            value: message,
        }
    }

    fn panic(message: String) -> Self {
        let thread = std::thread::current();
        let trace = format!(
            "thread '{}' panicked: {}",
            thread.name().unwrap_or("<unnamed>"),
            message
        );
        Self {
            kind: "panic".to_string(),
            value: message,
            trace,
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.value)
    }
}
