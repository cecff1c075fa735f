//! Timed ring: a single-level timing wheel of FIFO slots with an occupancy bitmap.
//!
//! The ring has `SLOTS` slots of `quantum` time each. Slot `i`, counted from the
//! rotating base index `ibase`, holds tasks due in
//! `[tbase + i * quantum, tbase + (i + 1) * quantum)`. Insertion is O(1); extraction
//! finds the first occupied slot at or after `ibase` through the bitmap and moves the
//! base there.
//!
//! Tasks due past the horizon (`SLOTS * quantum` after `tbase`) are clamped into the
//! last slot, so far-future ordering is coarse. Tasks due before `tbase` land in the
//! current slot.
use crate::SchedError;

use super::{bitmap::SlotMap, pool::TaskPool, Link, RunQueue, TaskId};

/// FIFO links embedded in each pooled task.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RingLink {
    prev: Option<TaskId>,
    next: Option<TaskId>,
    slot: usize,
    linked: bool,
}

impl RingLink {
    /// Ring position of the slot holding this task, if queued.
    pub fn slot(&self) -> Option<usize> {
        self.linked.then_some(self.slot)
    }
}

impl Link for RingLink {
    fn is_linked(&self) -> bool {
        self.linked
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct Bucket {
    head: Option<TaskId>,
    tail: Option<TaskId>,
}

#[derive(Debug)]
pub struct TimedRing<const SLOTS: usize> {
    buckets: [Bucket; SLOTS],
    map: SlotMap,
    ibase: usize,
    tbase: u64,
    anchored: bool,
    quantum: u64,
    len: usize,
}

/// The benchmark's ring geometry: 256 slots.
pub type RunRing = TimedRing<256>;

impl<const SLOTS: usize> TimedRing<SLOTS> {
    const MASK: usize = SLOTS.wrapping_sub(1);

    /// New empty ring with slots `quantum` time units wide.
    pub fn new(quantum: u64) -> Result<Self, SchedError> {
        if !SLOTS.is_power_of_two() {
            return Err(SchedError::InvalidSlotCount(SLOTS));
        }
        if quantum == 0 {
            return Err(SchedError::ZeroQuantum);
        }
        Ok(Self {
            buckets: array_init::array_init(|_| Bucket::default()),
            map: SlotMap::new(SLOTS),
            ibase: 0,
            tbase: 0,
            anchored: false,
            quantum,
            len: 0,
        })
    }

    /// Fix the time origin to a specific timestamp.
    ///
    /// Without this, the first task inserted into an empty ring sets the origin.
    pub fn set_time(&mut self, time: u64) {
        self.tbase = time;
        self.anchored = true;
    }

    /// Time at the start of the base slot, once an origin is set.
    pub fn base(&self) -> Option<u64> {
        self.anchored.then_some(self.tbase)
    }

    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    /// Furthest offset from the base that keeps exact slot placement.
    pub fn horizon(&self) -> u64 {
        self.quantum.saturating_mul(SLOTS as u64)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Ring position a task due at `key` would be appended to.
    pub fn slot_for(&self, key: u64) -> usize {
        let offset = key.saturating_sub(self.tbase) / self.quantum;
        let idx = offset.min(SLOTS as u64 - 1) as usize;
        (idx + self.ibase) & Self::MASK
    }

    /// Queue `task` due at `key`, behind anything already in its slot.
    pub fn insert(
        &mut self,
        pool: &mut TaskPool<RingLink>,
        task: TaskId,
        key: u64,
    ) -> Result<(), SchedError> {
        pool.ensure_free(task)?;
        if !self.anchored {
            self.set_time(key);
        }
        pool.set_key(task, key);

        let slot = self.slot_for(key);
        let bucket = &mut self.buckets[slot];
        *pool.link_mut(task) = RingLink {
            prev: bucket.tail,
            next: None,
            slot,
            linked: true,
        };
        match bucket.tail {
            Some(tail) => pool.link_mut(tail).next = Some(task),
            None => bucket.head = Some(task),
        }
        bucket.tail = Some(task);
        self.map.set(slot);
        self.len += 1;
        Ok(())
    }

    /// Head of the first occupied slot, without removing it.
    pub fn peek(&self) -> Option<TaskId> {
        let slot = self.map.find_next_wrapping(self.ibase)?;
        self.buckets[slot].head
    }

    /// Remove and return the earliest task, moving the base to its slot.
    ///
    /// An empty ring forgets its time origin.
    pub fn extract_min(&mut self, pool: &mut TaskPool<RingLink>) -> Result<TaskId, SchedError> {
        let Some(slot) = self.map.find_next_wrapping(self.ibase) else {
            if self.anchored {
                log::trace!("timed ring drained, dropping origin {}", self.tbase);
            }
            self.tbase = 0;
            self.anchored = false;
            return Err(SchedError::EmptyQueue);
        };
        let task = self.buckets[slot]
            .head
            .ok_or(SchedError::Corrupted("occupied slot has no head"))?;
        self.unlink(pool, task);

        let d = slot.wrapping_sub(self.ibase) & Self::MASK;
        self.ibase = slot;
        self.tbase += self.quantum * d as u64;
        Ok(task)
    }

    /// Remove an arbitrary queued task. The base does not move.
    pub fn remove(&mut self, pool: &mut TaskPool<RingLink>, task: TaskId) -> Result<(), SchedError> {
        pool.ensure_queued(task)?;
        if !self.contains(pool, task) {
            return Err(SchedError::NotQueued(task));
        }
        self.unlink(pool, task);
        Ok(())
    }

    /// Tasks in extraction order: slots from the base around the ring, FIFO within each.
    pub fn iter<'a>(&'a self, pool: &'a TaskPool<RingLink>) -> impl Iterator<Item = TaskId> + 'a {
        (0..SLOTS)
            .map(move |i| (self.ibase + i) & Self::MASK)
            .filter(move |&slot| self.map.test(slot))
            .flat_map(move |slot| {
                std::iter::successors(self.buckets[slot].head, move |&t| pool.link(t).next)
            })
    }

    /// Verify that every bitmap bit matches its slot, and the FIFO links agree.
    pub fn check(&self, pool: &TaskPool<RingLink>) -> Result<(), SchedError> {
        let mut total = 0;
        for (slot, bucket) in self.buckets.iter().enumerate() {
            if self.map.test(slot) != bucket.head.is_some() {
                return Err(SchedError::Corrupted("occupancy bit disagrees with slot"));
            }
            let mut prev = None;
            let mut cur = bucket.head;
            while let Some(task) = cur {
                let link = pool.link(task);
                if !link.linked || link.slot != slot || link.prev != prev {
                    return Err(SchedError::Corrupted("slot list links are inconsistent"));
                }
                total += 1;
                if total > self.len {
                    return Err(SchedError::Corrupted("more tasks linked than queued"));
                }
                prev = cur;
                cur = link.next;
            }
            if bucket.tail != prev {
                return Err(SchedError::Corrupted("slot tail is stale"));
            }
        }
        if total != self.len {
            return Err(SchedError::Corrupted("task count differs from queue length"));
        }
        Ok(())
    }

    fn contains(&self, pool: &TaskPool<RingLink>, task: TaskId) -> bool {
        let link = pool.link(task);
        let bucket = &self.buckets[link.slot & Self::MASK];
        let mut head = task;
        while let Some(prev) = pool.link(head).prev {
            head = prev;
        }
        link.slot < SLOTS && bucket.head == Some(head)
    }

    fn unlink(&mut self, pool: &mut TaskPool<RingLink>, task: TaskId) {
        let RingLink { prev, next, slot, .. } = *pool.link(task);
        let bucket = &mut self.buckets[slot];
        match prev {
            Some(p) => pool.link_mut(p).next = next,
            None => bucket.head = next,
        }
        match next {
            Some(n) => pool.link_mut(n).prev = prev,
            None => bucket.tail = prev,
        }
        if bucket.head.is_none() {
            self.map.clear(slot);
        }
        *pool.link_mut(task) = RingLink::default();
        self.len -= 1;
    }
}

impl<const SLOTS: usize> RunQueue for TimedRing<SLOTS> {
    type Link = RingLink;

    fn insert(
        &mut self,
        pool: &mut TaskPool<RingLink>,
        task: TaskId,
        key: u64,
    ) -> Result<(), SchedError> {
        TimedRing::insert(self, pool, task, key)
    }

    fn extract_min(&mut self, pool: &mut TaskPool<RingLink>) -> Result<TaskId, SchedError> {
        TimedRing::extract_min(self, pool)
    }

    fn is_empty(&self) -> bool {
        TimedRing::is_empty(self)
    }

    fn len(&self) -> usize {
        TimedRing::len(self)
    }
}
