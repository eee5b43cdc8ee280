//! Scoped acquisition: tasks that are closed on every exit path.

use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Result, TaskError};
use crate::failure::Failure;
use crate::operand::Operand;
use crate::purpose::Purpose;
use crate::task::Task;

/// An open task. Closing is guaranteed
///
/// Only [`TaskScope::finish`] closes the task as a success. Dropping the
/// guard unclosed records a failure: a panic if the thread is unwinding,
/// otherwise an abandoned scope, which is how an early `?` return shows up.
#[must_use = "dropping the scope closes the task immediately"]
pub struct TaskScope<'a> {
    task: &'a mut Task,
    closed: bool,
}

impl<'a> TaskScope<'a> {
    /// Close the task normally
    pub fn finish(mut self) -> Result<()> {
        self.closed = true;
        self.task.exit(None)
    }

    /// Close the task with a captured failure
    ///
    /// `error` is only observed; the caller keeps ownership and propagates it
    pub fn fail<E: std::fmt::Display + std::fmt::Debug + ?Sized>(mut self, error: &E) -> Result<()> {
        self.closed = true;
        self.task.exit(Some(Failure::from_error(error)))
    }

    /// Close the task with an already-built failure record
    pub fn fail_with(mut self, failure: Failure) -> Result<()> {
        self.closed = true;
        self.task.exit(Some(failure))
    }
}

impl Deref for TaskScope<'_> {
    type Target = Task;

    fn deref(&self) -> &Task {
        &*self.task
    }
}

impl DerefMut for TaskScope<'_> {
    fn deref_mut(&mut self) -> &mut Task {
        &mut *self.task
    }
}

impl Drop for TaskScope<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let failure = if std::thread::panicking() {
            Failure::unwinding()
        } else {
            Failure::abandoned()
        };
        if let Err(e) = self.task.exit(Some(failure)) {
            tracing::error!(error = %e, "Failed to log task close");
        }
    }
}

impl Task {
    /// Open the task and return a guard that closes it
    pub fn open(&mut self) -> Result<TaskScope<'_>> {
        self.enter()?;
        Ok(TaskScope {
            task: self,
            closed: false,
        })
    }

    /// Run `body` inside this task
    ///
    /// An `Err` from `body` is recorded as the task's failure and returned
    /// unchanged. A panic is recorded and then resumed. Sink errors while
    /// closing never replace the body's own error.
    pub fn scope<T, E, F>(&mut self, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Task) -> std::result::Result<T, E>,
        E: std::fmt::Display + std::fmt::Debug + From<TaskError>,
    {
        self.enter()?;
        match panic::catch_unwind(AssertUnwindSafe(|| body(self))) {
            Ok(Ok(value)) => {
                self.exit(None)?;
                Ok(value)
            }
            Ok(Err(error)) => {
                if let Err(e) = self.exit(Some(Failure::from_error(&error))) {
                    tracing::error!(error = %e, "Failed to log task failure");
                }
                Err(error)
            }
            Err(payload) => {
                if let Err(e) = self.exit(Some(Failure::from_panic(payload.as_ref()))) {
                    tracing::error!(error = %e, "Failed to log task panic");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Trace a function call as a child of this task
    ///
    /// The child gets `purpose`, the call's operands and, on success, its
    /// return value.
    pub fn call<A, K, S, V, T, E, F>(
        &self,
        purpose: impl Into<Purpose>,
        args: A,
        kwargs: K,
        f: F,
    ) -> std::result::Result<T, E>
    where
        A: IntoIterator,
        A::Item: Into<Operand>,
        K: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Operand>,
        T: Clone + Into<Operand>,
        F: FnOnce(&mut Task) -> std::result::Result<T, E>,
        E: std::fmt::Display + std::fmt::Debug + From<TaskError>,
    {
        let mut child = self.child(purpose);
        child.arguments(args, kwargs);
        child.scope(|task| {
            let value = f(task)?;
            Ok(task.returns(value))
        })
    }
}
