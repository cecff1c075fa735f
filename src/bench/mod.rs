//! Run-queue churn benchmark.
//!
//! Every task of a pool is queued with a random due time inside the ring's
//! horizon, then the loop repeatedly takes the earliest task and requeues it a
//! seventh of the horizon later. That is the dequeue/requeue profile a scheduler
//! run-queue sees on every context switch; the cost is reported per loop.
use std::fmt::Display;

use crate::{
    scheduling::{fair::FairQueue, pool::TaskPool, ring::RunRing, RunQueue},
    SchedError,
};

pub mod config;
pub mod cycles;
pub mod rng;

pub use config::BenchConfig;
use rng::XorShift64;

/// Slots in the benchmark ring, also the key range in slot units.
pub const RING_SLOTS: u64 = 256;
/// Width of one slot: 5ms in nanoseconds.
pub const NS_SLOT: u64 = 5_000_000;

/// Averaged cost of one dequeue/requeue cycle on one structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub name: &'static str,
    pub elapsed: u64,
    pub loops: usize,
}

impl Sample {
    pub fn per_loop(&self) -> f64 {
        if self.loops == 0 {
            return 0.0;
        }
        self.elapsed as f64 / self.loops as f64
    }
}

impl Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<3} = {:.2} {}/loop", self.name, self.per_loop(), cycles::UNIT)
    }
}

/// Queue every task in `pool` at a random slot-aligned time in `[0, slots * NS_SLOT)`.
pub fn populate<Q: RunQueue>(
    queue: &mut Q,
    pool: &mut TaskPool<Q::Link>,
    rng: &mut XorShift64,
    slots: u64,
) -> Result<(), SchedError> {
    let ids: Vec<_> = pool.ids().collect();
    for task in ids {
        queue.insert(pool, task, rng.below(slots) * NS_SLOT)?;
    }
    log::debug!("populated {} tasks over {slots} slots", queue.len());
    Ok(())
}

/// `loops` rounds of extract-min then requeue at `key + step`. Returns elapsed counter ticks.
pub fn churn<Q: RunQueue>(
    queue: &mut Q,
    pool: &mut TaskPool<Q::Link>,
    loops: usize,
    step: u64,
) -> Result<u64, SchedError> {
    let start = cycles::now();
    for _ in 0..loops {
        let task = queue.extract_min(pool)?;
        let key = pool.key(task)?;
        queue.insert(pool, task, key + step)?;
    }
    let end = cycles::now();
    Ok(end.saturating_sub(start))
}

fn measure<Q: RunQueue>(
    name: &'static str,
    mut queue: Q,
    config: &BenchConfig,
) -> Result<Sample, SchedError> {
    let mut pool = TaskPool::with_capacity(config.tasks)?;
    let mut rng = XorShift64::new(config.seed);
    populate(&mut queue, &mut pool, &mut rng, RING_SLOTS)?;
    let elapsed = churn(&mut queue, &mut pool, config.loops, (RING_SLOTS / 7) * NS_SLOT)?;
    let sample = Sample {
        name,
        elapsed,
        loops: config.loops,
    };
    log::debug!("{name}: {} loops in {elapsed} {}", config.loops, cycles::UNIT);
    Ok(sample)
}

/// Churn through the red-black fair queue.
pub fn run_fair(config: &BenchConfig) -> Result<Sample, SchedError> {
    measure("CFS", FairQueue::new(), config)
}

/// Churn through the timed ring, anchored at time 0.
pub fn run_ring(config: &BenchConfig) -> Result<Sample, SchedError> {
    let mut ring = RunRing::new(NS_SLOT)?;
    ring.set_time(0);
    measure("TR", ring, config)
}

/// Both structures, tree first.
pub fn run(config: &BenchConfig) -> Result<Vec<Sample>, SchedError> {
    log::info!(
        "benchmarking {} tasks over {} loops (seed {})",
        config.tasks,
        config.loops,
        config.seed
    );
    Ok(vec![run_fair(config)?, run_ring(config)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::{rbtree::TreeLink, ring::RingLink};

    fn small() -> BenchConfig {
        BenchConfig {
            tasks: 64,
            loops: 1_000,
            ..BenchConfig::default()
        }
    }

    #[test]
    fn both_structures_agree_on_order() {
        let config = small();
        let step = (RING_SLOTS / 7) * NS_SLOT;

        let mut fair = FairQueue::new();
        let mut fair_pool = TaskPool::<TreeLink>::with_capacity(config.tasks).unwrap();
        populate(&mut fair, &mut fair_pool, &mut XorShift64::new(config.seed), RING_SLOTS).unwrap();

        let mut ring = RunRing::new(NS_SLOT).unwrap();
        ring.set_time(0);
        let mut ring_pool = TaskPool::<RingLink>::with_capacity(config.tasks).unwrap();
        populate(&mut ring, &mut ring_pool, &mut XorShift64::new(config.seed), RING_SLOTS).unwrap();

        // equal keys may leave in different task order, but the key stream must match
        for _ in 0..config.loops {
            let a = fair.extract_min(&mut fair_pool).unwrap();
            let b = ring.extract_min(&mut ring_pool).unwrap();
            let key = fair_pool.key(a).unwrap();
            assert_eq!(key, ring_pool.key(b).unwrap());
            fair.insert(&mut fair_pool, a, key + step).unwrap();
            ring.insert(&mut ring_pool, b, key + step).unwrap();
        }
        fair.check(&fair_pool).unwrap();
        ring.check(&ring_pool).unwrap();
    }

    #[test]
    fn churn_conserves_tasks() {
        let config = small();
        let mut queue = FairQueue::new();
        let mut pool = TaskPool::<TreeLink>::with_capacity(config.tasks).unwrap();
        populate(&mut queue, &mut pool, &mut XorShift64::new(3), RING_SLOTS).unwrap();
        churn(&mut queue, &mut pool, config.loops, NS_SLOT).unwrap();
        assert_eq!(queue.len(), config.tasks);
        assert_eq!(queue.iter(&pool).count(), config.tasks);
        for _ in 0..config.tasks {
            queue.extract_min(&mut pool).unwrap();
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn churn_on_empty_queue_fails() {
        let mut queue = FairQueue::new();
        let mut pool = TaskPool::<TreeLink>::with_capacity(1).unwrap();
        assert_eq!(
            churn(&mut queue, &mut pool, 1, NS_SLOT).unwrap_err(),
            SchedError::EmptyQueue
        );
    }

    #[test]
    fn run_reports_both() {
        let samples = run(&small()).unwrap();
        let names: Vec<_> = samples.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["CFS", "TR"]);
        assert!(samples.iter().all(|s| s.loops == 1_000));
    }

    #[test]
    fn sample_formatting() {
        let sample = Sample {
            name: "TR",
            elapsed: 1_000,
            loops: 8,
        };
        assert_eq!(sample.to_string(), format!("TR  = 125.00 {}/loop", cycles::UNIT));
        let idle = Sample { loops: 0, ..sample };
        assert_eq!(idle.per_loop(), 0.0);
    }
}
