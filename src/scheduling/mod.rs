//! Task orderings with low algorithmic complexity, for scheduler run-queues.
//!
//! Currently, this module contains a red-black virtual-time tree (`fair`) and a
//! bitmap-indexed timed ring (`ring`). Both keep their links inside the tasks of a
//! `TaskPool`, addressed by `TaskId`, so neither structure owns task memory.
use std::fmt::Display;

use crate::SchedError;

pub mod bitmap;
pub mod fair;
pub mod pool;
pub mod rbtree;
pub mod ring;

use pool::TaskPool;

/// Handle of a task inside a `TaskPool`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-task link state a queue embeds in every pooled task.
pub trait Link: Copy + Default {
    /// Whether the task currently sits in a queue.
    fn is_linked(&self) -> bool;
}

/// Time-ordered collection of pooled tasks.
pub trait RunQueue {
    type Link: Link;

    /// Queue `task` at time `key`.
    fn insert(
        &mut self,
        pool: &mut TaskPool<Self::Link>,
        task: TaskId,
        key: u64,
    ) -> Result<(), SchedError>;
    /// Remove and return the task with the smallest key.
    fn extract_min(&mut self, pool: &mut TaskPool<Self::Link>) -> Result<TaskId, SchedError>;
    fn is_empty(&self) -> bool;
    fn len(&self) -> usize;
}
