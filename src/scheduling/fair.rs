//! Fair run-queue: tasks ordered by virtual time in a red-black tree.
//!
//! The leftmost (smallest key) node is cached, so picking the next task never
//! walks the tree. When the cached node leaves the tree the cache moves to its
//! in-order successor.
//!
//! Equal keys descend to the right on insert, but rebalancing may reorder them:
//! tasks sharing a key come out in no particular order. `TimedRing` is FIFO
//! within a slot; the two structures deliberately differ here.
use crate::SchedError;

use super::{
    pool::TaskPool,
    rbtree::{RbRoot, Side, TreeLink},
    RunQueue, TaskId,
};

#[derive(Debug, Default)]
pub struct FairQueue {
    timeline: RbRoot,
    leftmost: Option<TaskId>,
    len: usize,
}

impl FairQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Queue `task` at virtual time `key`.
    pub fn insert(
        &mut self,
        pool: &mut TaskPool<TreeLink>,
        task: TaskId,
        key: u64,
    ) -> Result<(), SchedError> {
        pool.ensure_free(task)?;
        pool.set_key(task, key);

        let mut up = None;
        let mut side = Side::Left;
        let mut leftmost = true;
        let mut cur = self.timeline.root();
        while let Some(node) = cur {
            up = Some(node);
            // no care for collisions, equal keys go right
            if key < pool.key_of(node) {
                side = Side::Left;
                cur = RbRoot::left_of(pool, node);
            } else {
                side = Side::Right;
                cur = RbRoot::right_of(pool, node);
                leftmost = false;
            }
        }

        if leftmost {
            self.leftmost = Some(task);
        }
        self.timeline.link_node(pool, task, up, side);
        self.timeline.insert_color(pool, task);
        self.len += 1;
        Ok(())
    }

    /// Smallest-key task, without removing it.
    pub fn peek(&self, pool: &TaskPool<TreeLink>) -> Option<TaskId> {
        self.leftmost.or_else(|| self.timeline.first(pool))
    }

    /// Remove and return the smallest-key task.
    pub fn extract_min(&mut self, pool: &mut TaskPool<TreeLink>) -> Result<TaskId, SchedError> {
        let first = self.peek(pool).ok_or(SchedError::EmptyQueue)?;
        self.dequeue(pool, first);
        Ok(first)
    }

    /// Remove an arbitrary queued task.
    pub fn remove(&mut self, pool: &mut TaskPool<TreeLink>, task: TaskId) -> Result<(), SchedError> {
        pool.ensure_queued(task)?;
        if !self.contains(pool, task) {
            return Err(SchedError::NotQueued(task));
        }
        self.dequeue(pool, task);
        Ok(())
    }

    /// Swap queued `victim` for free `new`; `new` takes the victim's key and slot.
    pub fn replace(
        &mut self,
        pool: &mut TaskPool<TreeLink>,
        victim: TaskId,
        new: TaskId,
    ) -> Result<(), SchedError> {
        pool.ensure_queued(victim)?;
        pool.ensure_free(new)?;
        if !self.contains(pool, victim) {
            return Err(SchedError::NotQueued(victim));
        }
        pool.set_key(new, pool.key_of(victim));
        self.timeline.replace_node(pool, victim, new);
        if self.leftmost == Some(victim) {
            self.leftmost = Some(new);
        }
        Ok(())
    }

    /// Tasks in key order.
    pub fn iter<'a>(&self, pool: &'a TaskPool<TreeLink>) -> impl Iterator<Item = TaskId> + 'a {
        std::iter::successors(self.peek(pool), move |&node| RbRoot::next(pool, node))
    }

    /// Verify the tree invariants plus the leftmost cache and length.
    ///
    /// Returns the black height.
    pub fn check(&self, pool: &TaskPool<TreeLink>) -> Result<usize, SchedError> {
        let (black_height, count) = self.timeline.check(pool)?;
        if count != self.len {
            return Err(SchedError::Corrupted("node count differs from queue length"));
        }
        if self.leftmost != self.timeline.first(pool) {
            return Err(SchedError::Corrupted("leftmost cache is stale"));
        }
        Ok(black_height)
    }

    // a linked task whose root is ours belongs to this queue
    fn contains(&self, pool: &TaskPool<TreeLink>, task: TaskId) -> bool {
        let mut node = task;
        while let Some(up) = RbRoot::parent_of(pool, node) {
            node = up;
        }
        self.timeline.root() == Some(node)
    }

    fn dequeue(&mut self, pool: &mut TaskPool<TreeLink>, task: TaskId) {
        if self.leftmost == Some(task) {
            self.leftmost = RbRoot::next(pool, task);
        }
        self.timeline.erase(pool, task);
        self.len -= 1;
    }
}

impl RunQueue for FairQueue {
    type Link = TreeLink;

    fn insert(
        &mut self,
        pool: &mut TaskPool<TreeLink>,
        task: TaskId,
        key: u64,
    ) -> Result<(), SchedError> {
        FairQueue::insert(self, pool, task, key)
    }

    fn extract_min(&mut self, pool: &mut TaskPool<TreeLink>) -> Result<TaskId, SchedError> {
        FairQueue::extract_min(self, pool)
    }

    fn is_empty(&self) -> bool {
        FairQueue::is_empty(self)
    }

    fn len(&self) -> usize {
        FairQueue::len(self)
    }
}
