//! Task model - one traced unit of work.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::TaskConfig;
use crate::error::{Result, TaskError};
use crate::failure::Failure;
use crate::id::{IdSource, RandomIds, TaskId};
use crate::operand::Operand;
use crate::purpose::Purpose;
use crate::sink::LogSink;
use crate::Time;

/// Lifecycle status of a task
///
/// `Begin -> {End, Fail} -> Done`. Closing lines show `End`/`Fail`; `Done`
/// is set right after they are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    /// Opened and running
    Begin,
    /// Scope exited normally
    End,
    /// Scope exited with a failure
    Fail,
    /// Fully closed
    Done,
}

impl TaskStatus {
    /// Log label
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Begin => "BEGIN",
            TaskStatus::End => "END",
            TaskStatus::Fail => "FAIL",
            TaskStatus::Done => "DONE",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Messages accepted by [`Task::info`], [`Task::warning`] and [`Task::error`]:
/// a single string or a sequence of strings.
pub trait IntoMessages {
    /// Split into individual messages
    fn into_messages(self) -> Vec<String>;
}

impl IntoMessages for &str {
    fn into_messages(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoMessages for String {
    fn into_messages(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoMessages for &String {
    fn into_messages(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl<S: Into<String>> IntoMessages for Vec<S> {
    fn into_messages(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<S: Into<String>, const N: usize> IntoMessages for [S; N] {
    fn into_messages(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<S: AsRef<str>> IntoMessages for &[S] {
    fn into_messages(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

/// A traced unit of work
///
/// A task is created, opened (which assigns its id and logs `BEGIN`),
/// mutated freely, and closed exactly once. It is owned by one caller for
/// its whole scope; nothing here is synchronized.
pub struct Task {
    pub(crate) parent_id: Option<TaskId>,
    pub(crate) id: Option<TaskId>,
    pub(crate) purpose: Purpose,
    pub(crate) start_time: Option<Time>,
    pub(crate) end_time: Option<Time>,
    pub(crate) status: Option<TaskStatus>,
    pub(crate) units_expected: BTreeMap<String, u64>,
    pub(crate) units_consumed: BTreeMap<String, u64>,
    pub(crate) args: Option<Vec<Operand>>,
    pub(crate) kwargs: Option<BTreeMap<String, Operand>>,
    pub(crate) return_value: Option<Operand>,
    pub(crate) exception: Option<Failure>,
    pub(crate) warnings: Vec<String>,
    pub(crate) errors: Vec<String>,
    pub(crate) sink: LogSink,
    pub(crate) ids: Arc<dyn IdSource>,
    pub(crate) config: TaskConfig,
}

impl Task {
    /// Create a task with a disabled sink and random ids
    pub fn new(purpose: impl Into<Purpose>) -> Self {
        Self {
            parent_id: None,
            id: None,
            purpose: purpose.into(),
            start_time: Some(chrono::Utc::now()),
            end_time: None,
            status: None,
            units_expected: BTreeMap::new(),
            units_consumed: BTreeMap::new(),
            args: None,
            kwargs: None,
            return_value: None,
            exception: None,
            warnings: Vec::new(),
            errors: Vec::new(),
            sink: LogSink::Disabled,
            ids: Arc::new(RandomIds),
            config: TaskConfig::default(),
        }
    }

    /// Create a task whose sink, limits and dump settings come from `config`
    pub fn from_config(purpose: impl Into<Purpose>, config: &TaskConfig) -> Result<Self> {
        let sink = LogSink::from_config(&config.sink)?;
        Ok(Self::new(purpose).with_sink(sink).with_config(config.clone()))
    }

    /// Set the log sink
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    /// Set the id source
    pub fn with_ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    /// Set limits and dump settings. The sink is left untouched
    pub fn with_config(mut self, config: TaskConfig) -> Self {
        self.config = config;
        self
    }

    /// Nest under `parent`. Only the parent's id is kept
    pub fn with_parent(mut self, parent: &Task) -> Self {
        self.parent_id = parent.id;
        self
    }

    /// Create a child task sharing this task's sink, id source and config
    pub fn child(&self, purpose: impl Into<Purpose>) -> Task {
        Task::new(purpose)
            .with_sink(self.sink.clone())
            .with_ids(self.ids.clone())
            .with_config(self.config.clone())
            .with_parent(self)
    }

    /// Open the task: assign an id, record the start time and log `BEGIN`
    ///
    /// Prefer [`Task::open`] or [`Task::scope`], which guarantee the task
    /// gets closed.
    pub fn enter(&mut self) -> Result<&mut Self> {
        self.id = Some(self.ids.next_id());
        self.start_time = Some(chrono::Utc::now());
        self.status = Some(TaskStatus::Begin);
        self.log(None)?;
        Ok(self)
    }

    /// Close the task, observing `failure` if the scope exited abnormally
    ///
    /// The status ends as `Done` even when emitting a closing line fails;
    /// the first emission error is returned. The failure itself is only
    /// recorded, never consumed: the caller keeps propagating it.
    pub fn exit(&mut self, failure: Option<Failure>) -> Result<()> {
        self.end_time = Some(chrono::Utc::now());
        let trace = failure.as_ref().map(|f| f.trace.clone());
        match failure {
            Some(failure) => {
                self.status = Some(TaskStatus::Fail);
                self.exception = Some(failure);
                self.dump_operands();
            }
            None => self.status = Some(TaskStatus::End),
        }

        let mut result = self.log(None);
        if let Some(trace) = trace {
            let traced = self.log(Some(&trace));
            result = result.and(traced);
        }
        self.status = Some(TaskStatus::Done);
        result
    }

    fn dump_operands(&self) {
        if !self.config.dump.enabled {
            return;
        }
        let (Some(id), Some(args)) = (self.id, self.args.as_ref()) else {
            return;
        };
        let empty = BTreeMap::new();
        let kwargs = self.kwargs.as_ref().unwrap_or(&empty);
        if let Err(e) = crate::dump::write_operands(&self.config.dump.dir, id, args, kwargs) {
            tracing::warn!(task = %id, error = %e, "Failed to dump task operands");
        }
    }

    /// Attach the call's positional and named operands. Last call wins
    pub fn arguments<A, K, S, V>(&mut self, args: A, kwargs: K) -> &mut Self
    where
        A: IntoIterator,
        A::Item: Into<Operand>,
        K: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Operand>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self.kwargs = Some(kwargs.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Attach positional operands only
    pub fn positional<A>(&mut self, args: A) -> &mut Self
    where
        A: IntoIterator,
        A::Item: Into<Operand>,
    {
        self.arguments(args, std::iter::empty::<(String, Operand)>())
    }

    /// Register the return value and hand it back
    pub fn returns<T: Clone + Into<Operand>>(&mut self, value: T) -> T {
        self.return_value = Some(value.clone().into());
        value
    }

    /// Expect `count` units of `unit`, resetting its consumed count
    pub fn expect_units(&mut self, unit: impl Into<String>, count: u64) {
        let unit = unit.into();
        self.units_consumed.insert(unit.clone(), 0);
        self.units_expected.insert(unit, count);
    }

    /// Consume `count` units of `unit`, which must have been expected
    ///
    /// Consuming more than expected is allowed
    pub fn consume_units(&mut self, unit: &str, count: u64) -> Result<()> {
        let consumed = self
            .units_consumed
            .get_mut(unit)
            .ok_or_else(|| TaskError::UnknownUnit(unit.to_string()))?;
        *consumed = consumed.saturating_add(count);
        Ok(())
    }

    /// Emit a message alongside the task's current state
    pub fn info(&mut self, message: impl IntoMessages) -> Result<()> {
        let messages = message.into_messages();
        self.log(Some(&messages.join("\n")))
    }

    /// Emit a message and keep it in [`Task::warnings`]
    pub fn warning(&mut self, message: impl IntoMessages) -> Result<()> {
        let messages = message.into_messages();
        let emitted = self.log(Some(&messages.join("\n")));
        self.warnings.extend(messages);
        emitted
    }

    /// Emit a message and keep it in [`Task::errors`]
    pub fn error(&mut self, message: impl IntoMessages) -> Result<()> {
        let messages = message.into_messages();
        let emitted = self.log(Some(&messages.join("\n")));
        self.errors.extend(messages);
        emitted
    }

    /// True if any error was recorded
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Append `other`'s errors to this task's. Nothing else is merged
    pub fn collect(&mut self, other: &Task) {
        self.errors.extend(other.errors.iter().cloned());
    }

    fn log(&self, message: Option<&str>) -> Result<()> {
        if !self.sink.is_enabled() {
            return Ok(());
        }
        let rendered = self.render();
        match message {
            Some(message) => self.sink.emit(&format!("{rendered} {message}")),
            None => self.sink.emit(&rendered),
        }
    }

    /// Id assigned at open time
    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    /// Id of the enclosing task
    pub fn parent_id(&self) -> Option<TaskId> {
        self.parent_id
    }

    /// Full, untruncated purpose
    pub fn purpose(&self) -> &Purpose {
        &self.purpose
    }

    /// Current status; `None` before the task is opened
    pub fn status(&self) -> Option<TaskStatus> {
        self.status
    }

    /// Start timestamp
    pub fn start_time(&self) -> Option<Time> {
        self.start_time
    }

    /// End timestamp, set when the task closes
    pub fn end_time(&self) -> Option<Time> {
        self.end_time
    }

    /// Expected count for a unit type
    pub fn units_expected(&self, unit: &str) -> Option<u64> {
        self.units_expected.get(unit).copied()
    }

    /// Consumed count for a unit type
    pub fn units_consumed(&self, unit: &str) -> Option<u64> {
        self.units_consumed.get(unit).copied()
    }

    /// Positional operands
    pub fn args(&self) -> Option<&[Operand]> {
        self.args.as_deref()
    }

    /// Named operands
    pub fn kwargs(&self) -> Option<&BTreeMap<String, Operand>> {
        self.kwargs.as_ref()
    }

    /// Registered return value
    pub fn return_value(&self) -> Option<&Operand> {
        self.return_value.as_ref()
    }

    /// Failure captured at close
    pub fn exception(&self) -> Option<&Failure> {
        self.exception.as_ref()
    }

    /// Accumulated warnings, oldest first
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Accumulated errors, oldest first
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The task's log sink
    pub fn sink(&self) -> &LogSink {
        &self.sink
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("purpose", &self.purpose)
            .field("status", &self.status)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::id::{SequentialIds, ID_LIMIT};
    use std::sync::Mutex;

    /// Task emitting into a shared line buffer, with ids counting from 100
    pub(crate) fn captured(purpose: &str) -> (Task, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let lines = lines.clone();
            LogSink::callback(move |line| lines.lock().unwrap().push(line.to_string()))
        };
        let mut config = TaskConfig::default();
        config.dump.enabled = false;
        let task = Task::new(purpose)
            .with_sink(sink)
            .with_ids(Arc::new(SequentialIds::new(100)))
            .with_config(config);
        (task, lines)
    }

    #[test]
    fn test_enter_assigns_id_and_begins() {
        let (mut task, lines) = captured("load");
        assert!(task.id().is_none());
        assert!(task.status().is_none());

        task.enter().unwrap();
        assert_eq!(task.status(), Some(TaskStatus::Begin));
        assert!(task.id().unwrap().value() < ID_LIMIT);
        assert_eq!(*lines.lock().unwrap(), vec!["BEGIN task100 load()".to_string()]);
    }

    #[test]
    fn test_enter_with_random_ids() {
        let mut task = Task::new("random");
        task.enter().unwrap();
        assert!(task.id().unwrap().value() < ID_LIMIT);
    }

    #[test]
    fn test_exit_normal_path() {
        let (mut task, lines) = captured("load");
        task.enter().unwrap();
        task.exit(None).unwrap();

        assert_eq!(task.status(), Some(TaskStatus::Done));
        assert!(task.end_time().unwrap() >= task.start_time().unwrap());
        assert!(task.exception().is_none());

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("END   task100 load() "));
        assert!(lines[1].ends_with("ms"));
    }

    #[test]
    fn test_exit_failure_path() {
        let (mut task, lines) = captured("load");
        task.enter().unwrap();
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        task.exit(Some(Failure::from_error(&err))).unwrap();

        assert_eq!(task.status(), Some(TaskStatus::Done));
        let failure = task.exception().unwrap();
        assert_eq!(failure.value, "disk gone");
        assert!(!failure.kind.is_empty());
        assert!(!failure.trace.is_empty());

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("FAIL  task100 load() "));
        assert!(lines[1].contains(" RAISES "));
        assert!(lines[2].ends_with(&failure.trace));
    }

    #[test]
    fn test_arguments_last_call_wins() {
        let mut task = Task::new("f");
        task.arguments([1], [("a", 1)]);
        task.arguments(["x", "y"], [("b", true)]);
        assert_eq!(task.args().unwrap(), &[Operand::from("x"), Operand::from("y")]);
        assert_eq!(task.kwargs().unwrap().len(), 1);
        assert_eq!(task.kwargs().unwrap()["b"], Operand::Bool(true));
    }

    #[test]
    fn test_positional_sets_empty_kwargs() {
        let mut task = Task::new("f");
        task.positional([1, 2]);
        assert!(task.kwargs().unwrap().is_empty());
        assert_eq!(task.render(), "      f(1,2)");
    }

    #[test]
    fn test_returns_hands_value_back() {
        let mut task = Task::new("f");
        let result = task.returns(vec![1, 2, 3]);
        assert_eq!(result, vec![1, 2, 3]);
        assert_eq!(
            task.return_value(),
            Some(&Operand::List(vec![Operand::Int(1), Operand::Int(2), Operand::Int(3)]))
        );
    }

    #[test]
    fn test_units_expect_and_consume() {
        let mut task = Task::new("import");
        task.expect_units("rows", 100);
        task.consume_units("rows", 30).unwrap();
        task.consume_units("rows", 20).unwrap();
        assert_eq!(task.units_consumed("rows"), Some(50));
        assert_eq!(task.units_expected("rows"), Some(100));

        task.consume_units("rows", 80).unwrap();
        assert_eq!(task.units_consumed("rows"), Some(130));

        task.expect_units("rows", 10);
        assert_eq!(task.units_consumed("rows"), Some(0));
    }

    #[test]
    fn test_consume_unregistered_unit_fails() {
        let mut task = Task::new("import");
        let err = task.consume_units("rows", 5).unwrap_err();
        assert!(matches!(err, TaskError::UnknownUnit(ref u) if u == "rows"));
    }

    #[test]
    fn test_consume_units_saturates() {
        let mut task = Task::new("copy");
        task.expect_units("bytes", u64::MAX);
        task.consume_units("bytes", u64::MAX).unwrap();
        task.consume_units("bytes", 1).unwrap();
        assert_eq!(task.units_consumed("bytes"), Some(u64::MAX));
    }

    #[test]
    fn test_info_does_not_accumulate() {
        let (mut task, lines) = captured("job");
        task.info("starting").unwrap();
        assert!(task.warnings().is_empty());
        assert!(task.errors().is_empty());
        assert_eq!(*lines.lock().unwrap(), vec!["      job() starting".to_string()]);
    }

    #[test]
    fn test_warning_list_keeps_order() {
        let (mut task, lines) = captured("job");
        task.warning(["a", "b"]).unwrap();
        assert_eq!(task.warnings(), &["a".to_string(), "b".to_string()]);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("a\nb"));
    }

    #[test]
    fn test_error_accumulates() {
        let (mut task, _lines) = captured("job");
        assert!(!task.has_errors());
        task.error("bad row").unwrap();
        task.error(vec!["worse row".to_string()]).unwrap();
        assert!(task.has_errors());
        assert_eq!(task.errors(), &["bad row".to_string(), "worse row".to_string()]);
    }

    #[test]
    fn test_collect_merges_only_errors() {
        let mut parent = Task::new("parent");
        parent.error("p1").unwrap();
        parent.warning("pw").unwrap();
        parent.positional([1]);

        let mut child = Task::new("child");
        child.error("c1").unwrap();
        child.warning("cw").unwrap();

        parent.collect(&child);
        assert_eq!(parent.errors(), &["p1".to_string(), "c1".to_string()]);
        assert_eq!(parent.warnings(), &["pw".to_string()]);
        assert_eq!(parent.args().unwrap(), &[Operand::Int(1)]);
        assert!(parent.status().is_none());
    }

    #[test]
    fn test_child_links_parent() {
        let (mut parent, lines) = captured("parent");
        parent.enter().unwrap();
        let mut child = parent.child("child");
        assert_eq!(child.parent_id(), parent.id());

        child.enter().unwrap();
        assert_eq!(child.id(), Some(TaskId::new(101)));
        assert_eq!(lines.lock().unwrap()[1], "BEGIN task101 child()");
    }

    #[test]
    fn test_child_of_unopened_has_no_parent_id() {
        let parent = Task::new("parent");
        assert!(parent.child("child").parent_id().is_none());
    }

    #[test]
    fn test_status_pads_in_format() {
        assert_eq!(format!("{:<5}|", TaskStatus::End), "END  |");
        assert_eq!(serde_json::to_string(&TaskStatus::Fail).unwrap(), "\"FAIL\"");
    }
}
