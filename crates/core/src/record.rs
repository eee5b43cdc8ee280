//! Plain structured records of task state.
//!
//! Timestamps are RFC 3339 strings with an offset. Ids are decimal strings;
//! `0x`, `0o` and `0b` prefixes are accepted when reading.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::failure::Failure;
use crate::id::TaskId;
use crate::operand::Operand;
use crate::task::{Task, TaskStatus};
use crate::Time;

/// Serialized form of a [`Task`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Enclosing task's id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Task id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Full purpose
    #[serde(default)]
    pub purpose: String,

    /// When the task was opened
    #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Time>,

    /// When the task was closed
    #[serde(rename = "endTime", default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Time>,

    /// Expected counts per unit type
    #[serde(rename = "unitsExpected", default)]
    pub units_expected: BTreeMap<String, u64>,

    /// Consumed counts per unit type
    #[serde(rename = "unitsConsumed", default)]
    pub units_consumed: BTreeMap<String, u64>,

    /// Warnings, oldest first
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Errors, oldest first
    #[serde(default)]
    pub errors: Vec<String>,

    /// Positional operands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Operand>>,

    /// Named operands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kwargs: Option<BTreeMap<String, Operand>>,

    /// Return value
    #[serde(rename = "returnValue", default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<Operand>,

    /// Captured failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<Failure>,

    /// Status at the time the record was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskRecord {
    /// Parse a record from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Task {
    /// Snapshot the task's state
    pub fn to_record(&self) -> TaskRecord {
        TaskRecord {
            parent_id: self.parent_id.map(|id| id.to_string()),
            id: self.id.map(|id| id.to_string()),
            purpose: self.purpose.as_str().to_string(),
            start_time: self.start_time,
            end_time: self.end_time,
            units_expected: self.units_expected.clone(),
            units_consumed: self.units_consumed.clone(),
            warnings: self.warnings.clone(),
            errors: self.errors.clone(),
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
            return_value: self.return_value.clone(),
            exception: self.exception.clone(),
            status: self.status,
        }
    }

    /// Rebuild a task from a record
    ///
    /// The task gets a disabled sink and default configuration; attach
    /// others with the `with_*` builders.
    pub fn from_record(record: TaskRecord) -> Result<Task> {
        let mut task = Task::new(record.purpose);
        task.parent_id = record.parent_id.as_deref().map(TaskId::parse).transpose()?;
        task.id = record.id.as_deref().map(TaskId::parse).transpose()?;
        task.start_time = record.start_time;
        task.end_time = record.end_time;
        task.units_expected = record.units_expected;
        task.units_consumed = record.units_consumed;
        task.warnings = record.warnings;
        task.errors = record.errors;
        task.args = record.args;
        task.kwargs = record.kwargs;
        task.return_value = record.return_value;
        task.exception = record.exception;
        task.status = record.status;
        Ok(task)
    }
}
