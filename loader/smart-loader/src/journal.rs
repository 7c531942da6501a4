//! # Fault Journal
//!
//! Records the first fills of a run for the `debug` log. The trap cannot
//! log, so it writes into pre-allocated atomic slots and the log lines are
//! produced after the program has returned.

use crate::PageFill;
use core::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use loader_addresses::{Size4K, VirtualAddress, VirtualPage};
use loader_host::Protection;
use log::debug;

#[derive(Debug, Default)]
struct Slot {
    page: AtomicU64,
    file_bytes: AtomicU64,
    fragmentation: AtomicU64,
    protection: AtomicU8,
}

/// Fixed-capacity record of page fills, in fault order.
#[derive(Debug)]
pub struct FaultJournal {
    slots: Box<[Slot]>,
    recorded: AtomicUsize,
}

impl FaultJournal {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Slot::default()).collect(),
            recorded: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store `fill` if there is room left. Never allocates.
    pub fn record(&self, fill: &PageFill) {
        let index = self.recorded.fetch_add(1, Ordering::Relaxed);
        let Some(slot) = self.slots.get(index) else {
            return;
        };
        slot.page.store(fill.page.base().as_u64(), Ordering::Relaxed);
        slot.file_bytes.store(fill.file_bytes, Ordering::Relaxed);
        slot.fragmentation
            .store(fill.fragmentation, Ordering::Relaxed);
        slot.protection
            .store(fill.protection.into_bits(), Ordering::Relaxed);
    }

    /// Fills seen, including those past capacity.
    #[must_use]
    pub fn total(&self) -> usize {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Recorded fills in fault order.
    pub fn entries(&self) -> impl Iterator<Item = PageFill> + '_ {
        self.slots.iter().take(self.total()).map(|slot| PageFill {
            page: VirtualPage::<Size4K>::containing_address(VirtualAddress::new(
                slot.page.load(Ordering::Relaxed),
            )),
            file_bytes: slot.file_bytes.load(Ordering::Relaxed),
            fragmentation: slot.fragmentation.load(Ordering::Relaxed),
            protection: Protection::from_bits(slot.protection.load(Ordering::Relaxed)),
        })
    }

    /// Emit the journal at `debug` level.
    pub fn log(&self) {
        for (n, fill) in self.entries().enumerate() {
            debug!(
                "Fault {n}: page {} filled with {} file bytes, {} bytes fragmentation, {}",
                fill.page, fill.file_bytes, fill.fragmentation, fill.protection
            );
        }

        let dropped = self.total().saturating_sub(self.capacity());
        if dropped > 0 {
            debug!("{dropped} further faults not journaled");
        }
    }
}
