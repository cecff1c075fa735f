//! Cycle counter for the churn loops.
//!
//! x86_64 reads the time-stamp counter. Other targets fall back to monotonic
//! nanoseconds, and `UNIT` says which one the numbers are in.

#[cfg(target_arch = "x86_64")]
pub const UNIT: &str = "cycles";
#[cfg(not(target_arch = "x86_64"))]
pub const UNIT: &str = "ns";

#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn now() -> u64 {
    // SAFETY: rdtsc has no preconditions and is available on every x86_64 CPU.
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline(always)]
pub fn now() -> u64 {
    use std::{sync::OnceLock, time::Instant};

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}
