//! Log sinks: where rendered task lines go.

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::config::SinkConfig;
use crate::error::{Result, TaskError};

/// Destination for rendered task lines
///
/// Cloning a sink shares the underlying writer or callback, so child tasks
/// can emit to the same place as their parent.
#[derive(Clone, Default)]
pub enum LogSink {
    /// Drop every line
    #[default]
    Disabled,
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
    /// `tracing::info!` events under the `tasktrace` target
    Tracing,
    /// Any writable stream; each line is newline-terminated
    Writer(Arc<Mutex<Box<dyn Write + Send>>>),
    /// A callback receiving each line
    Callback(Arc<dyn Fn(&str) + Send + Sync>),
}

impl LogSink {
    /// Sink writing to a stream
    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        LogSink::Writer(Arc::new(Mutex::new(Box::new(writer))))
    }

    /// Sink calling `f` with each line
    pub fn callback(f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        LogSink::Callback(Arc::new(f))
    }

    /// Build a sink from configuration
    pub fn from_config(config: &SinkConfig) -> Result<Self> {
        Ok(match config {
            SinkConfig::Disabled => LogSink::Disabled,
            SinkConfig::Stdout => LogSink::Stdout,
            SinkConfig::Stderr => LogSink::Stderr,
            SinkConfig::Tracing => LogSink::Tracing,
            SinkConfig::File { path, append } => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(*append)
                    .truncate(!*append)
                    .open(path)?;
                LogSink::writer(file)
            }
        })
    }

    /// True unless the sink drops everything
    pub fn is_enabled(&self) -> bool {
        !matches!(self, LogSink::Disabled)
    }

    /// Emit one rendered line
    pub fn emit(&self, line: &str) -> Result<()> {
        match self {
            LogSink::Disabled => {}
            LogSink::Stdout => {
                writeln!(std::io::stdout().lock(), "{line}").map_err(TaskError::Sink)?;
            }
            LogSink::Stderr => {
                writeln!(std::io::stderr().lock(), "{line}").map_err(TaskError::Sink)?;
            }
            LogSink::Tracing => {
                tracing::info!(target: "tasktrace", "{}", line);
            }
            LogSink::Writer(writer) => {
                let mut writer = writer.lock().map_err(|_| {
                    TaskError::Sink(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "log writer lock poisoned",
                    ))
                })?;
                writeln!(writer, "{line}").map_err(TaskError::Sink)?;
                writer.flush().map_err(TaskError::Sink)?;
            }
            LogSink::Callback(f) => f(line),
        }
        Ok(())
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogSink::Disabled => "Disabled",
            LogSink::Stdout => "Stdout",
            LogSink::Stderr => "Stderr",
            LogSink::Tracing => "Tracing",
            LogSink::Writer(_) => "Writer",
            LogSink::Callback(_) => "Callback",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_terminates_lines() {
        let buf = SharedBuf::default();
        let sink = LogSink::writer(buf.clone());
        sink.emit("one").unwrap();
        sink.emit("two").unwrap();
        assert_eq!(String::from_utf8(buf.0.lock().unwrap().clone()).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_callback_receives_line() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            LogSink::callback(move |line| seen.lock().unwrap().push(line.to_string()))
        };
        sink.emit("hello").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_disabled_is_noop() {
        assert!(!LogSink::Disabled.is_enabled());
        LogSink::Disabled.emit("ignored").unwrap();
    }

    #[test]
    fn test_writer_error_surfaces() {
        let sink = LogSink::writer(BrokenPipe);
        assert!(matches!(sink.emit("x"), Err(TaskError::Sink(_))));
    }

    #[test]
    fn test_file_sink_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.log");
        let sink = LogSink::from_config(&SinkConfig::File {
            path: path.clone(),
            append: false,
        })
        .unwrap();
        sink.emit("line").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "line\n");
    }
}
