//! # Execution Statistics

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Counters written by the fault trap, read once the program has returned.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    faults: AtomicU64,
    allocations: AtomicU64,
    fragmentation: AtomicU64,
}

impl ExecutionStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            faults: AtomicU64::new(0),
            allocations: AtomicU64::new(0),
            fragmentation: AtomicU64::new(0),
        }
    }

    /// Account for one resolved fault that mapped one page.
    pub fn record(&self, fragmentation_bytes: u64) {
        self.faults.fetch_add(1, Ordering::Relaxed);
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.fragmentation
            .fetch_add(fragmentation_bytes, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsReport {
        StatsReport {
            faults: self.faults.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            fragmentation_bytes: self.fragmentation.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ExecutionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsReport {
    pub faults: u64,
    pub allocations: u64,
    pub fragmentation_bytes: u64,
}

impl StatsReport {
    /// Internal fragmentation in KiB.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fragmentation_kib(&self) -> f64 {
        self.fragmentation_bytes as f64 / 1024.0
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Execution Statistics:")?;
        writeln!(f, "Page faults: {}", self.faults)?;
        writeln!(f, "Page allocations: {}", self.allocations)?;
        writeln!(f, "Internal Fragmentation: {:.2} KB", self.fragmentation_kib())
    }
}
