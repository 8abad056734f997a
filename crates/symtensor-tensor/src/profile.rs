//! Process-wide diagnostic counters.
//!
//! Mirrors the specification's §5 resource-model counters (`COUNTER`,
//! `ELEMNUM`, `MAXELEMNUM`, `MAXELEMTEN`): every live `SymTensor` bumps
//! `COUNTER` on construction, and block allocation/deallocation keeps the
//! element-count gauges current. `symtensor-io::profile` formats these into
//! the human-readable summary the spec's `profile()` entry point produces.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

/// Total number of `SymTensor`s constructed so far (monotonic, never
/// decremented — matches uni10's `UniTensor` instance counter).
pub static COUNTER: AtomicI64 = AtomicI64::new(0);

/// Elements currently held across all live tensors' blocks.
pub static ELEMNUM: AtomicUsize = AtomicUsize::new(0);

/// High-water mark of `ELEMNUM`.
pub static MAXELEMNUM: AtomicUsize = AtomicUsize::new(0);

/// Largest single allocation ever made for one tensor's blocks.
pub static MAXELEMTEN: AtomicUsize = AtomicUsize::new(0);

/// Registers a newly constructed tensor and returns its ordinal id.
pub fn tensor_created() -> i64 {
    COUNTER.fetch_add(1, Ordering::Relaxed) + 1
}

pub fn record_elem_alloc(n: usize) {
    let total = ELEMNUM.fetch_add(n, Ordering::Relaxed) + n;
    MAXELEMNUM.fetch_max(total, Ordering::Relaxed);
    MAXELEMTEN.fetch_max(n, Ordering::Relaxed);
}

pub fn record_elem_free(n: usize) {
    ELEMNUM.fetch_sub(n, Ordering::Relaxed);
}

/// Point-in-time reading of every counter, suitable for logging or display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub tensors_created: i64,
    pub elem_num: usize,
    pub max_elem_num: usize,
    pub max_elem_ten: usize,
}

pub fn snapshot() -> ProfileSnapshot {
    ProfileSnapshot {
        tensors_created: COUNTER.load(Ordering::Relaxed),
        elem_num: ELEMNUM.load(Ordering::Relaxed),
        max_elem_num: MAXELEMNUM.load(Ordering::Relaxed),
        max_elem_ten: MAXELEMTEN.load(Ordering::Relaxed),
    }
}

impl std::fmt::Display for ProfileSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tensors_created={} elem_num={} max_elem_num={} max_elem_ten={}",
            self.tensors_created, self.elem_num, self.max_elem_num, self.max_elem_ten
        )
    }
}
