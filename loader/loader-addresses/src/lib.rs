//! # Virtual Addresses, Pages and Ranges
//!
//! Strongly typed wrappers for the raw addresses the demand-paged loader
//! computes with while servicing faults.
//!
//! ## Overview
//!
//! | Type | Description |
//! |----------|-------------|
//! | [`VirtualAddress`] | An address in the loaded program's address space. |
//! | [`VirtualPage<S>`] | A page-aligned base address of a page of size `S`. |
//! | [`PageOffset<S>`] | An offset within a page of size `S`. |
//! | [`VirtualRange`] | A half-open range `[start, end)`, e.g. a segment's in-memory extent. |
//!
//! Only 4 KiB pages ([`Size4K`]) are used by the loader. The [`PageSize`]
//! trait defines the constants [`SIZE`](PageSize::SIZE),
//! [`SHIFT`](PageSize::SHIFT) and [`MASK`](PageSize::MASK) used throughout the
//! helpers.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use loader_addresses::*;
//! let segment = VirtualRange::from_start_len(VirtualAddress::new(0x0804_8fa0), 100).unwrap();
//!
//! // The segment straddles a page boundary.
//! assert_eq!(segment.page_count::<Size4K>(), 2);
//!
//! let fault = VirtualAddress::new(0x0804_8fa0);
//! let page = fault.page::<Size4K>();
//! assert_eq!(page.base().as_u64(), 0x0804_8000);
//!
//! // The part of the segment that lies in the faulting page.
//! let slice = page.range().intersect(segment).unwrap();
//! assert_eq!(slice.len(), 0x60);
//! ```
//!
//! ## Design Notes
//!
//! - Addresses are carried as `u64` even though the images are 32-bit, so
//!   `vaddr + memsz` style sums are checked instead of wrapping.
//! - Host pointers are produced only through [`VirtualAddress::as_host_ptr`],
//!   which rejects addresses the host cannot represent.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod page_offset;
mod page_size;
mod virtual_address;
mod virtual_page;
mod virtual_range;

pub use page_offset::PageOffset;
pub use page_size::{PageSize, Size4K};
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;
pub use virtual_range::{Pages, VirtualRange};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn va(v: u64) -> VirtualAddress {
        VirtualAddress::new(v)
    }

    #[test]
    fn split_and_join_4k() {
        let a = va(0x0804_9ABC);
        let (p, o) = a.split::<Size4K>();
        assert_eq!(p.base().as_u64() & 0xFFF, 0);
        assert_eq!(o.as_u64(), 0xABC);
        assert_eq!(p.join(o), a);
    }

    #[test]
    fn alignment_helpers() {
        let a = va(0x12345);
        assert_eq!(a.page::<Size4K>().base().as_u64(), 0x12000);
        assert_eq!(a.offset::<Size4K>().as_u64(), 0x345);
        assert_eq!(a.offset::<Size4K>().remaining(), 0x1000 - 0x345);
    }

    #[test]
    fn aligned_try_from() {
        assert!(VirtualPage::<Size4K>::try_from(va(0x4000)).is_ok());
        assert_eq!(VirtualPage::<Size4K>::try_from(va(0x4001)), Err(va(0x4001)));
    }

    #[test]
    fn range_intersections() {
        let a = VirtualRange::new(va(0x1000), va(0x2000));
        let b = VirtualRange::new(va(0x1800), va(0x3000));
        let c = VirtualRange::new(va(0x2000), va(0x3000));

        assert_eq!(a.intersect(b), Some(VirtualRange::new(va(0x1800), va(0x2000))));
        assert_eq!(a.intersect(c), None, "touching ranges do not overlap");
        assert!(a.contains(va(0x1FFF)));
        assert!(!a.contains(va(0x2000)));
    }

    #[test]
    fn inverted_range_is_empty() {
        let r = VirtualRange::new(va(0x2000), va(0x1000));
        assert!(r.is_empty());
        assert_eq!(r.page_count::<Size4K>(), 0);
        assert_eq!(r.pages::<Size4K>().count(), 0);
    }

    #[test]
    fn range_overflow_is_rejected() {
        assert!(VirtualRange::from_start_len(va(u64::MAX - 1), 4).is_none());
        assert!(VirtualPage::<Size4K>::containing_address(va(u64::MAX)).end().is_none());
    }

    #[test]
    fn page_count_straddling() {
        // 100 bytes starting 4000 bytes into a page spill into the next one.
        let r = VirtualRange::from_start_len(va(0x8000 + 4000), 100).unwrap();
        assert_eq!(r.page_count::<Size4K>(), 2);
        let pages: Vec<_> = r.pages::<Size4K>().map(|p| p.base().as_u64()).collect();
        assert_eq!(pages, vec![0x8000, 0x9000]);
    }

    #[test]
    fn host_pointer_rejects_null() {
        assert!(va(0).as_host_ptr::<u8>().is_none());
        assert!(va(0x1000).as_host_ptr::<u8>().is_some());
    }

    proptest! {
        #[test]
        fn page_base_is_masked_address(addr in 0u64..=u64::from(u32::MAX)) {
            let page = va(addr).page::<Size4K>();
            prop_assert_eq!(page.base().as_u64(), addr & !(Size4K::SIZE - 1));
            prop_assert!(page.range().contains(va(addr)));
        }

        #[test]
        fn pages_cover_range(start in 0u64..0x1_0000_0000, len in 0u64..0x10_0000) {
            let r = VirtualRange::from_start_len(va(start), len).unwrap();
            let pages: Vec<_> = r.pages::<Size4K>().collect();
            prop_assert_eq!(pages.len() as u64, r.page_count::<Size4K>());
            if let (Some(first), Some(last)) = (pages.first(), pages.last()) {
                prop_assert!(first.range().contains(r.start()));
                prop_assert!(last.range().contains(va(r.end().as_u64() - 1)));
            }
        }
    }
}
