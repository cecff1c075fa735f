//! Run-queue primitives for scheduler experiments.
//!
//! Two interchangeable task orderings share one contract (`RunQueue`): a red-black
//! tree keyed by virtual time with a cached leftmost node (`FairQueue`), and a ring
//! of FIFO slots indexed by an occupancy bitmap (`TimedRing`). The `bench` module
//! drives both through the same dequeue/requeue churn a scheduler sees on every
//! context switch.
pub mod bench;
pub mod error;
pub mod scheduling;

pub use bench::BenchConfig;
pub use error::SchedError;
pub use scheduling::{
    fair::FairQueue,
    pool::{Task, TaskPool},
    ring::TimedRing,
    RunQueue, TaskId,
};
