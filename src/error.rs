use thiserror::Error;

use crate::scheduling::TaskId;

/// Error type for the run-queues, the task pool and the benchmark driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedError {
    #[error("Queue is empty, nothing to extract")]
    EmptyQueue,
    #[error("Failed to allocate a pool of {tasks} tasks")]
    PoolAllocation { tasks: usize },
    #[error("Task {0} does not belong to this pool")]
    UnknownTask(TaskId),
    #[error("Task {0} is already queued")]
    AlreadyQueued(TaskId),
    #[error("Task {0} is not queued")]
    NotQueued(TaskId),
    #[error("Slot count must be a non-zero power of two, got {0}")]
    InvalidSlotCount(usize),
    #[error("Slot quantum must be greater than 0")]
    ZeroQuantum,
    #[error("Structure corrupted: {0}")]
    Corrupted(&'static str),
    #[error("Missing value for `{0}`")]
    MissingValue(String),
    #[error("Invalid value `{value}` for `{flag}`")]
    InvalidValue { flag: String, value: String },
    #[error("Unknown flag `{0}`")]
    UnknownFlag(String),
}
