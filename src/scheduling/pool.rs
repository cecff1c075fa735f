//! Fixed-capacity task storage shared by the run-queues.
use crate::SchedError;

use super::{Link, TaskId};

/// A pooled task: its current key plus the link state of whichever queue holds it.
#[derive(Copy, Clone, Debug, Default)]
pub struct Task<L> {
    pub(crate) key: u64,
    pub(crate) link: L,
}

impl<L> Task<L> {
    pub fn key(&self) -> u64 {
        self.key
    }
}

/// Owner of every task a queue can reference.
///
/// Allocated once up front; tasks are never freed individually, only recycled
/// through the queues.
#[derive(Debug)]
pub struct TaskPool<L> {
    tasks: Vec<Task<L>>,
}

impl<L: Link> TaskPool<L> {
    /// Allocate `tasks` unqueued tasks with key 0.
    pub fn with_capacity(tasks: usize) -> Result<Self, SchedError> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(tasks)
            .map_err(|_| SchedError::PoolAllocation { tasks })?;
        storage.resize(tasks, Task::default());
        Ok(Self { tasks: storage })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Handles of every task in the pool, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> {
        (0..self.tasks.len()).map(TaskId)
    }

    pub fn get(&self, id: TaskId) -> Result<&Task<L>, SchedError> {
        self.tasks.get(id.0).ok_or(SchedError::UnknownTask(id))
    }

    pub fn key(&self, id: TaskId) -> Result<u64, SchedError> {
        self.get(id).map(|task| task.key)
    }

    pub fn is_queued(&self, id: TaskId) -> Result<bool, SchedError> {
        self.get(id).map(|task| task.link.is_linked())
    }

    /// Validate `id` for queueing: it must exist and be unlinked.
    pub(crate) fn ensure_free(&self, id: TaskId) -> Result<(), SchedError> {
        if self.is_queued(id)? {
            return Err(SchedError::AlreadyQueued(id));
        }
        Ok(())
    }

    /// Validate `id` for removal: it must exist and be linked.
    pub(crate) fn ensure_queued(&self, id: TaskId) -> Result<(), SchedError> {
        if !self.is_queued(id)? {
            return Err(SchedError::NotQueued(id));
        }
        Ok(())
    }

    // Unchecked accessors below; callers validate handles at the queue boundary.

    pub(crate) fn key_of(&self, id: TaskId) -> u64 {
        self.tasks[id.0].key
    }

    pub(crate) fn set_key(&mut self, id: TaskId, key: u64) {
        self.tasks[id.0].key = key;
    }

    pub(crate) fn link(&self, id: TaskId) -> &L {
        &self.tasks[id.0].link
    }

    pub(crate) fn link_mut(&mut self, id: TaskId) -> &mut L {
        &mut self.tasks[id.0].link
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Default)]
    struct Flag(bool);

    impl Link for Flag {
        fn is_linked(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn fresh_pool_is_unqueued() {
        let pool = TaskPool::<Flag>::with_capacity(4).unwrap();
        assert_eq!(pool.len(), 4);
        for id in pool.ids() {
            assert_eq!(pool.key(id).unwrap(), 0);
            assert!(!pool.is_queued(id).unwrap());
        }
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let pool = TaskPool::<Flag>::with_capacity(2).unwrap();
        let stray = TaskId(2);
        assert_eq!(pool.key(stray).unwrap_err(), SchedError::UnknownTask(stray));
        assert_eq!(
            pool.ensure_free(stray).unwrap_err(),
            SchedError::UnknownTask(stray)
        );
    }

    #[test]
    fn link_state_guards() {
        let mut pool = TaskPool::<Flag>::with_capacity(1).unwrap();
        let id = TaskId(0);
        assert_eq!(pool.ensure_queued(id).unwrap_err(), SchedError::NotQueued(id));
        pool.link_mut(id).0 = true;
        assert_eq!(pool.ensure_free(id).unwrap_err(), SchedError::AlreadyQueued(id));
        assert!(pool.ensure_queued(id).is_ok());
    }

    #[test]
    fn absurd_capacity_fails_cleanly() {
        let err = TaskPool::<Flag>::with_capacity(usize::MAX).unwrap_err();
        assert_eq!(err, SchedError::PoolAllocation { tasks: usize::MAX });
    }
}
