//! Lightweight task tracing.
//!
//! A [`Task`] wraps a unit of work: it records timing, call operands, the
//! return value, warnings, errors and unit progress, and emits a log line
//! when it begins and ends. Tasks nest by parent id and serialize to a
//! plain [`TaskRecord`].
//!
//! ```
//! use tasktrace_core::{LogSink, Task};
//!
//! let mut task = Task::new("import users").with_sink(LogSink::Stdout);
//! let imported: Result<u64, tasktrace_core::TaskError> = task.scope(|t| {
//!     t.positional(["users.csv"]);
//!     t.expect_units("rows", 2);
//!     t.consume_units("rows", 2)?;
//!     Ok(t.returns(2u64))
//! });
//! assert_eq!(imported.unwrap(), 2);
//! ```

#![warn(missing_docs)]

mod config;
mod dump;
mod error;
mod failure;
mod id;
mod operand;
mod purpose;
mod record;
mod render;
mod scope;
mod sink;
mod task;

pub use config::{DumpConfig, SinkConfig, TaskConfig, LOG_ENV, PURPOSE_LIMIT, RETURN_LIMIT};
pub use dump::{operand_paths, read_operands, write_operands};
pub use error::{Result, TaskError};
pub use failure::Failure;
pub use id::{FixedId, IdSource, RandomIds, SequentialIds, TaskId, ID_LIMIT};
pub use operand::Operand;
pub use purpose::Purpose;
pub use record::TaskRecord;
pub use render::{print_operand, truncate};
pub use scope::TaskScope;
pub use sink::LogSink;
pub use task::{IntoMessages, Task, TaskStatus};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
