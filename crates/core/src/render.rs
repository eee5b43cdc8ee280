//! Human-readable rendering of task state.

use crate::error::{Result, TaskError};
use crate::operand::Operand;
use crate::task::Task;
use crate::Time;

/// Marker appended to truncated text
const ELLIPSIS: &str = " ...";

/// Render an operand the way it appears inside a task line
///
/// Lists are bracketed, maps braced with `key: value` entries, both
/// comma-joined without spaces. Opaque values print as `Type@identity`.
pub fn print_operand(operand: &Operand) -> String {
    match operand {
        Operand::Null => "None".to_string(),
        Operand::Bool(b) => b.to_string(),
        Operand::Int(i) => i.to_string(),
        Operand::Float(f) => format!("{f:?}"),
        Operand::Str(s) | Operand::Display(s) => s.clone(),
        Operand::List(items) => {
            let inner: Vec<String> = items.iter().map(print_operand).collect();
            format!("[{}]", inner.join(","))
        }
        Operand::Map(entries) => {
            let inner: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", k, print_operand(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Operand::Opaque {
            type_name,
            identity,
        } => format!("{type_name}@{identity}"),
    }
}

/// Cut `text` so that it fits in `limit` characters, ellipsis included
///
/// Limits shorter than the ellipsis keep only its tail
pub fn truncate(text: &str, limit: usize) -> String {
    let keep = limit.saturating_sub(ELLIPSIS.len());
    if text.chars().count() <= keep {
        return text.to_string();
    }
    if limit < ELLIPSIS.len() {
        return ELLIPSIS[ELLIPSIS.len() - limit..].to_string();
    }
    let head: String = text.chars().take(keep).collect();
    format!("{head}{ELLIPSIS}")
}

impl Task {
    /// Render the task as a single log line, using the configured limits
    pub fn render(&self) -> String {
        self.render_with(self.config.purpose_limit, self.config.return_limit)
    }

    /// Render the task with explicit purpose and return value limits
    pub fn render_with(&self, purpose_limit: usize, return_limit: usize) -> String {
        let mut printed: Vec<String> = Vec::new();
        if let Some(args) = &self.args {
            printed.extend(args.iter().map(print_operand));
        }
        if let Some(kwargs) = &self.kwargs {
            printed.extend(kwargs.iter().map(|(k, v)| format!("{}={}", k, print_operand(v))));
        }

        let task_id = self
            .id
            .map(|id| format!("task{id} "))
            .unwrap_or_default();

        let mut line = format!(
            "{:<5} {}{}({})",
            self.status_label(),
            task_id,
            truncate(self.purpose.as_str(), purpose_limit),
            printed.join(",")
        );

        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            line.push_str(&format!(" {}ms", elapsed_ms(start, end)));
        }
        if let Some(value) = self.return_value.as_ref().filter(|v| !v.is_null()) {
            line.push_str(" RETURNS ");
            line.push_str(&truncate(&print_operand(value), return_limit));
        }
        if let Some(failure) = &self.exception {
            line.push_str(" RAISES ");
            line.push_str(&failure.trace);
        }
        line
    }

    /// One-line progress report for a unit type as of `now`
    ///
    /// Percent and throughput are plain float divisions: a zero expectation
    /// reports `NaN` or `inf`.
    pub fn report_unit(&self, unit: &str, now: Time) -> Result<String> {
        let expected = *self
            .units_expected
            .get(unit)
            .ok_or_else(|| TaskError::UnknownUnit(unit.to_string()))?;
        let consumed = self.units_consumed.get(unit).copied().unwrap_or(0);

        let mut line = format!(
            "{:<5} {}",
            self.status_label(),
            truncate(self.purpose.as_str(), self.config.purpose_limit)
        );
        line.push_str(&format!(" | {consumed}/{expected} {unit}"));
        line.push_str(&format!(
            " | {:.6}% complete",
            100.0 * consumed as f64 / expected as f64
        ));
        if let Some(start) = self.start_time {
            let seconds = elapsed_ms(start, now) / 1000.0;
            line.push_str(&format!(" | {:.6} {unit}/second", consumed as f64 / seconds));
        }
        Ok(line)
    }

    fn status_label(&self) -> &'static str {
        self.status.map(|s| s.as_str()).unwrap_or("")
    }
}

fn elapsed_ms(start: Time, end: Time) -> f64 {
    let delta = end - start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => delta.num_milliseconds() as f64,
    }
}
