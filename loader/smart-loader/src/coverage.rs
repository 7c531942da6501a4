//! # Page Coverage
//!
//! Which bytes of one page belong to some loadable segment. The uncovered
//! remainder is the page's internal fragmentation.

use loader_addresses::{PageSize, Size4K, VirtualPage, VirtualRange};

const PAGE_LEN: usize = Size4K::SIZE as usize;
const WORDS: usize = PAGE_LEN / u64::BITS as usize;

/// One bit per byte of a 4 KiB page. Lives on the stack; never allocates.
#[derive(Clone)]
pub struct PageCoverage {
    page: VirtualPage<Size4K>,
    bits: [u64; WORDS],
}

impl PageCoverage {
    #[must_use]
    pub const fn new(page: VirtualPage<Size4K>) -> Self {
        Self {
            page,
            bits: [0; WORDS],
        }
    }

    /// Mark the part of `range` that falls into the page.
    pub fn cover(&mut self, range: VirtualRange) {
        let Some(part) = range.intersect(self.page.range()) else {
            return;
        };
        let start = part.start().offset::<Size4K>().as_usize();
        let end = start + usize::try_from(part.len()).unwrap_or(PAGE_LEN);
        self.set(start, end.min(PAGE_LEN));
    }

    fn set(&mut self, start: usize, end: usize) {
        let mut at = start;
        while at < end {
            let (word, bit) = (at / 64, at % 64);
            let n = (64 - bit).min(end - at);
            let mask = if n == 64 { u64::MAX } else { ((1u64 << n) - 1) << bit };
            self.bits[word] |= mask;
            at += n;
        }
    }

    /// Bytes of the page inside at least one covered range.
    #[must_use]
    pub fn covered(&self) -> u64 {
        self.bits.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// Bytes of the page no covered range reaches.
    #[must_use]
    pub fn uncovered(&self) -> u64 {
        Size4K::SIZE - self.covered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loader_addresses::VirtualAddress;
    use proptest::prelude::*;

    const PAGE: u64 = 0x0804_9000;

    fn page() -> VirtualPage<Size4K> {
        VirtualAddress::new(PAGE).page()
    }

    fn range(start: u64, len: u64) -> VirtualRange {
        VirtualRange::from_start_len(VirtualAddress::new(start), len).unwrap()
    }

    #[test]
    fn untouched_page_is_fully_fragmented() {
        assert_eq!(PageCoverage::new(page()).uncovered(), 4096);
    }

    #[test]
    fn segment_starting_late_in_the_page() {
        let mut c = PageCoverage::new(page());
        c.cover(range(PAGE + 4000, 100));
        assert_eq!(c.covered(), 96);
        assert_eq!(c.uncovered(), 4000);
    }

    #[test]
    fn overlapping_ranges_count_once() {
        let mut c = PageCoverage::new(page());
        c.cover(range(PAGE + 0x100, 0x200));
        c.cover(range(PAGE + 0x200, 0x200));
        assert_eq!(c.covered(), 0x300);
    }

    #[test]
    fn ranges_outside_the_page_are_ignored() {
        let mut c = PageCoverage::new(page());
        c.cover(range(PAGE - 0x1000, 0x1000));
        c.cover(range(PAGE + 0x1000, 0x10));
        assert_eq!(c.covered(), 0);
    }

    proptest! {
        /// For a single segment the uncovered bytes are the lead on its first
        /// page plus the tail on its last page.
        #[test]
        fn single_segment_matches_lead_plus_tail(start in 0u64..0x3000, len in 1u64..0x3000) {
            let base = 0x1000_0000u64;
            let seg = range(base + start, len);
            for p in seg.pages::<Size4K>() {
                let mut c = PageCoverage::new(p);
                c.cover(seg);

                let p_start = p.base().as_u64();
                let p_end = p_start + 4096;
                let lead = seg.start().as_u64().saturating_sub(p_start);
                let tail = p_end.saturating_sub(seg.end().as_u64());
                prop_assert_eq!(c.uncovered(), lead + tail);
                prop_assert!(c.uncovered() < 4096);
            }
        }
    }
}
