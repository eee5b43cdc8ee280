//! tasktrace CLI - inspect task records and operand dumps.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tasktrace_core::{
    print_operand, purpose, read_operands, Operand, SinkConfig, Task, TaskConfig, TaskId,
    TaskRecord, LOG_ENV,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tasktrace")]
#[command(about = "Inspect traced tasks", long_about = None)]
struct Cli {
    /// Log sink for traced work: disabled, stdout, stderr, tracing or file:<path>
    #[arg(long, global = true)]
    log: Option<String>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a task record as a log line
    Render {
        /// Record file (JSON)
        record: PathBuf,
    },
    /// Report unit progress from a task record
    Report {
        /// Record file (JSON)
        record: PathBuf,
        /// Unit type
        #[arg(long)]
        unit: String,
    },
    /// Show the operands dumped by a failed task
    Operands {
        /// Task ID
        id: String,
        /// Directory holding the dumps
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Run a small traced workload
    Demo {
        /// Make the child task fail
        #[arg(long)]
        fail: bool,
        /// Write the parent's record to this file
        #[arg(long)]
        record: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { record } => {
            let task = load_task(&record).await?;
            println!("{}", task.render());
        }
        Commands::Report { record, unit } => {
            let task = load_task(&record).await?;
            let now = task.end_time().unwrap_or_else(chrono::Utc::now);
            println!("{}", task.report_unit(&unit, now)?);
        }
        Commands::Operands { id, dir } => {
            let id: TaskId = id.parse().map_err(|e| anyhow::anyhow!("Invalid task ID: {e}"))?;
            let (args, kwargs) = read_operands(&dir, id)
                .with_context(|| format!("No operand dump for task{id} in {}", dir.display()))?;
            println!("task{id}");
            println!("  args: {}", format_args_list(&args));
            for (key, value) in &kwargs {
                println!("  {key} = {}", print_operand(value));
            }
        }
        Commands::Demo { fail, record } => {
            let config = demo_config(cli.log.as_deref(), cli.config.as_deref())?;
            let task = run_demo(&config, fail)?;
            info!("Demo finished with {} error(s)", task.errors().len());
            if let Some(path) = record {
                tokio::fs::write(&path, task.to_record().to_json()?).await?;
                info!("Wrote record to {}", path.display());
            }
        }
    }

    Ok(())
}

async fn load_task(path: &Path) -> Result<Task> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record = TaskRecord::from_json(&json)?;
    Ok(Task::from_record(record)?)
}

/// Sink precedence: `--log`, then `TASKTRACE_LOG`, then the config file,
/// then stdout.
fn demo_config(log: Option<&str>, path: Option<&Path>) -> Result<TaskConfig> {
    let mut config = match path {
        Some(path) => TaskConfig::load(path)?,
        None => TaskConfig::default(),
    };
    if let Some(log) = log {
        config.sink = log.parse::<SinkConfig>()?;
    } else if let Ok(log) = std::env::var(LOG_ENV) {
        config.sink = log.parse::<SinkConfig>()?;
    } else if path.is_none() {
        config.sink = SinkConfig::Stdout;
    }
    Ok(config)
}

fn format_args_list(args: &[Operand]) -> String {
    args.iter().map(print_operand).collect::<Vec<_>>().join(", ")
}

/// Import a few batches under a parent task, collecting child errors into it
fn run_demo(config: &TaskConfig, fail: bool) -> Result<Task> {
    let mut parent = Task::from_config(purpose!("demo.import"), config)?;
    let batches = vec![vec![1, 2, 3], vec![4, 5], vec![6]];

    parent.scope(|task| -> Result<()> {
        task.positional([batches.len()]);
        task.expect_units("rows", 6);

        for (index, batch) in batches.iter().enumerate() {
            let mut child = task.child(purpose!("demo.load_batch"));
            child.arguments([Operand::from(batch.clone())], [("index", index)]);
            let outcome = child.scope(|load| -> Result<usize> {
                if fail && index == 1 {
                    let message = format!("batch {index} rejected");
                    load.error(message.as_str())?;
                    anyhow::bail!(message);
                }
                load.info(format!("loaded {} rows", batch.len()))?;
                Ok(load.returns(batch.len()))
            });
            task.collect(&child);
            if let Ok(rows) = outcome {
                task.consume_units("rows", rows as u64)?;
            }
            let report = task.report_unit("rows", chrono::Utc::now())?;
            task.info(report)?;
        }
        Ok(())
    })?;

    Ok(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasktrace_core::TaskStatus;

    #[tokio::test]
    async fn test_load_task_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.json");
        tokio::fs::write(&path, r#"{"id": "9", "purpose": "saved", "status": "DONE", "returnValue": 3}"#)
            .await
            .unwrap();

        let task = load_task(&path).await.unwrap();
        assert_eq!(task.render(), "DONE  task9 saved() RETURNS 3");
    }

    #[tokio::test]
    async fn test_load_task_missing_file() {
        let err = load_task(Path::new("/nonexistent/task.json")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_demo_success() {
        let config = TaskConfig::default();
        let task = run_demo(&config, false).unwrap();
        assert_eq!(task.status(), Some(TaskStatus::Done));
        assert!(!task.has_errors());
        assert_eq!(task.units_consumed("rows"), Some(6));
    }

    #[test]
    fn test_demo_failure_rolls_up_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TaskConfig::default();
        config.dump.dir = dir.path().to_path_buf();

        let task = run_demo(&config, true).unwrap();
        assert_eq!(task.errors().to_vec(), vec!["batch 1 rejected".to_string()]);
        assert!(task.exception().is_none());
        assert_eq!(task.units_consumed("rows"), Some(4));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_demo_config_flag_wins() {
        let config = demo_config(Some("stderr"), None).unwrap();
        assert_eq!(config.sink, SinkConfig::Stderr);
        assert!(demo_config(Some("syslog"), None).is_err());
    }

    #[test]
    fn test_demo_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasktrace.json");
        std::fs::write(&path, r#"{"return_limit": 20, "sink": {"kind": "tracing"}}"#).unwrap();

        let config = demo_config(Some("disabled"), Some(&path)).unwrap();
        assert_eq!(config.return_limit, 20);
        assert_eq!(config.sink, SinkConfig::Disabled);
    }

    #[test]
    fn test_format_args_list() {
        let args = vec![Operand::from("a"), Operand::Int(1)];
        assert_eq!(format_args_list(&args), "a, 1");
    }
}
