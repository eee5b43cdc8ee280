//! Purpose labels: why and where a task exists.

use serde::{Deserialize, Serialize};

/// Human-readable label for a task
///
/// The full text is kept; truncation happens only when rendering
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Purpose(String);

impl Purpose {
    /// Create a purpose from any label
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Label a call site: `"<file name>:<line>: <name>"`
    ///
    /// Only the last path component of `file` is kept
    pub fn call_site(file: &str, line: u32, name: &str) -> Self {
        let file = file.rsplit(['/', '\\']).next().unwrap_or(file);
        Self(format!("{file}:{line}: {name}"))
    }

    /// Label a method of `T`: `"<Type>.<method>"`
    pub fn method<T: ?Sized>(method: &str) -> Self {
        let type_name = crate::operand::short_type_name(std::any::type_name::<T>());
        Self(format!("{type_name}.{method}"))
    }

    /// Full label text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no label was given
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Purpose {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Purpose {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// Build a [`Purpose`] for the current source location
///
/// ```
/// let purpose = tasktrace_core::purpose!("Loader.run");
/// assert!(purpose.as_str().ends_with(": Loader.run"));
/// ```
#[macro_export]
macro_rules! purpose {
    ($name:expr) => {
        $crate::Purpose::call_site(file!(), line!(), $name)
    };
}
