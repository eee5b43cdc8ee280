//! Operand dumps written when a task fails.
//!
//! Each failed task with attached operands leaves `task<id>.args.json` and
//! `task<id>.kwargs.json` behind for postmortem inspection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::id::TaskId;
use crate::operand::Operand;

/// Paths of the positional and named operand dumps for `id`
pub fn operand_paths(dir: &Path, id: TaskId) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("task{id}.args.json")),
        dir.join(format!("task{id}.kwargs.json")),
    )
}

/// Write both dump files. Values JSON cannot represent are written as strings
pub fn write_operands(
    dir: &Path,
    id: TaskId,
    args: &[Operand],
    kwargs: &BTreeMap<String, Operand>,
) -> Result<(PathBuf, PathBuf)> {
    let (args_path, kwargs_path) = operand_paths(dir, id);
    std::fs::write(&args_path, serde_json::to_string(args)?)?;
    std::fs::write(&kwargs_path, serde_json::to_string(kwargs)?)?;
    Ok((args_path, kwargs_path))
}

/// Read back the dumps for `id`
pub fn read_operands(dir: &Path, id: TaskId) -> Result<(Vec<Operand>, BTreeMap<String, Operand>)> {
    let (args_path, kwargs_path) = operand_paths(dir, id);
    let args = serde_json::from_str(&std::fs::read_to_string(args_path)?)?;
    let kwargs = serde_json::from_str(&std::fs::read_to_string(kwargs_path)?)?;
    Ok((args, kwargs))
}
