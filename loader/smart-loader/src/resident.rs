//! # Resident Page Set

use core::sync::atomic::{AtomicBool, Ordering};
use loader_addresses::{PageSize, Size4K, VirtualPage, VirtualRange};
use loader_elf::SegmentTable;

/// Every page spanned by a loadable segment, each with a resident flag.
///
/// Sized once up front; marking a page never allocates.
#[derive(Debug)]
pub struct ResidentPages {
    pages: Box<[VirtualPage<Size4K>]>,
    resident: Box<[AtomicBool]>,
}

impl ResidentPages {
    #[must_use]
    pub fn for_segments(segments: &SegmentTable) -> Self {
        let mut pages: Vec<_> = segments
            .loadable()
            .flat_map(|s| s.memory_range().pages::<Size4K>())
            .collect();
        pages.sort_unstable();
        pages.dedup();

        let resident = pages.iter().map(|_| AtomicBool::new(false)).collect();
        Self {
            pages: pages.into_boxed_slice(),
            resident,
        }
    }

    /// Index of `page`, if any loadable segment spans it.
    #[must_use]
    pub fn slot(&self, page: VirtualPage<Size4K>) -> Option<usize> {
        self.pages.binary_search(&page).ok()
    }

    #[must_use]
    pub fn is_resident(&self, slot: usize) -> bool {
        self.resident
            .get(slot)
            .is_some_and(|r| r.load(Ordering::Relaxed))
    }

    /// Flag the page in `slot` resident; returns whether it already was.
    pub fn mark(&self, slot: usize) -> bool {
        self.resident
            .get(slot)
            .is_some_and(|r| r.swap(true, Ordering::Relaxed))
    }

    /// Number of pages spanned by loadable segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.resident
            .iter()
            .filter(|r| r.load(Ordering::Relaxed))
            .count()
    }

    /// Maximal runs of consecutive spanned pages, ascending.
    pub fn spans(&self) -> impl Iterator<Item = VirtualRange> + '_ {
        let mut rest = &self.pages[..];
        core::iter::from_fn(move || {
            let (first, tail) = rest.split_first()?;
            let run = 1 + tail
                .iter()
                .zip(&rest[..])
                .take_while(|(next, prev)| prev.next() == Some(**next))
                .count();
            rest = &rest[run..];
            let len = run as u64 * Size4K::SIZE;
            Some(VirtualRange::new(
                first.base(),
                first.base().checked_add(len).unwrap_or(first.base()),
            ))
        })
    }
}
