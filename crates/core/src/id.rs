//! Task identifiers and the sources that hand them out.

use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Exclusive upper bound for task ids (31 bits)
pub const ID_LIMIT: u32 = 1 << 31;

/// Identifier assigned to a task when it is opened
///
/// Ids are 31-bit random numbers. They are not guaranteed to be unique;
/// collisions are tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u32);

impl TaskId {
    /// Create an id, masking the value down to 31 bits
    pub fn new(value: u32) -> Self {
        Self(value & (ID_LIMIT - 1))
    }

    /// Raw numeric value
    pub fn value(self) -> u32 {
        self.0
    }

    /// Parse an id from a numeric string
    ///
    /// Decimal by default; `0x`, `0o` and `0b` prefixes select another base
    pub fn parse(s: &str) -> Result<Self, TaskError> {
        let s = s.trim();
        let (digits, radix) = match s.get(..2) {
            Some("0x") | Some("0X") => (&s[2..], 16),
            Some("0o") | Some("0O") => (&s[2..], 8),
            Some("0b") | Some("0B") => (&s[2..], 2),
            _ => (s, 10),
        };
        let value = u32::from_str_radix(digits, radix)
            .map_err(|e| TaskError::InvalidRecord(format!("bad task id {s:?}: {e}")))?;
        if value >= ID_LIMIT {
            return Err(TaskError::InvalidRecord(format!(
                "task id {value} exceeds 31 bits"
            )));
        }
        Ok(Self(value))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for TaskId {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Source of fresh task ids
pub trait IdSource: std::fmt::Debug + Send + Sync {
    /// Produce the id for a task being opened
    fn next_id(&self) -> TaskId;
}

/// Random 31-bit ids from the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> TaskId {
        TaskId(rand::thread_rng().gen_range(0..ID_LIMIT))
    }
}

/// Counting ids, starting at a seed. Useful for deterministic output
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU32,
}

impl SequentialIds {
    /// Start counting at `start`
    pub fn new(start: u32) -> Self {
        Self {
            next: AtomicU32::new(start),
        }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> TaskId {
        TaskId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Always the same id
#[derive(Debug, Clone, Copy)]
pub struct FixedId(pub TaskId);

impl IdSource for FixedId {
    fn next_id(&self) -> TaskId {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_stay_in_31_bits() {
        let source = RandomIds;
        for _ in 0..1000 {
            assert!(source.next_id().value() < ID_LIMIT);
        }
    }

    #[test]
    fn test_sequential_ids() {
        let source = SequentialIds::new(7);
        assert_eq!(source.next_id(), TaskId::new(7));
        assert_eq!(source.next_id(), TaskId::new(8));
    }

    #[test]
    fn test_new_masks_high_bit() {
        assert_eq!(TaskId::new(u32::MAX).value(), ID_LIMIT - 1);
    }

    #[test]
    fn test_parse_bases() {
        assert_eq!(TaskId::parse("42").unwrap(), TaskId::new(42));
        assert_eq!(TaskId::parse("0x2a").unwrap(), TaskId::new(42));
        assert_eq!(TaskId::parse("0o52").unwrap(), TaskId::new(42));
        assert_eq!(TaskId::parse("0b101010").unwrap(), TaskId::new(42));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(TaskId::parse("abc"), Err(TaskError::InvalidRecord(_))));
        assert!(TaskId::parse("2147483648").is_err());
    }
}
