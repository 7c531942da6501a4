use crate::{PageOffset, PageSize, VirtualAddress, VirtualRange};
use core::fmt;
use core::marker::PhantomData;

/// Virtual memory page base for size `S`.
///
/// A `VirtualPage<S>` represents the **page-aligned base** of a virtual page of
/// size `S` (`S::SIZE` bytes). This is the unit the loader maps on each fault.
///
/// ### Semantics
/// - `base()` returns the page base as a [`VirtualAddress`].
/// - `join(off)` combines this base with a [`PageOffset<S>`] to form a
///   full [`VirtualAddress`].
/// - `range()` is the half-open byte range `[base, base + S::SIZE)`.
///
/// ### Invariants
/// - The low `S::SHIFT` bits of the base are always zero (page aligned).
///
/// ### Examples
/// ```rust
/// # use loader_addresses::*;
/// let va = VirtualAddress::new(0x0804_8123);
/// let vp = va.page::<Size4K>();
/// assert_eq!(vp.base().as_u64(), 0x0804_8000);
/// assert_eq!(vp.join(va.offset::<Size4K>()), va);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage<S: PageSize> {
    base: u64,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> VirtualPage<S> {
    /// Page that contains `addr` (aligns down to page boundary).
    #[inline]
    #[must_use]
    pub const fn containing_address(addr: VirtualAddress) -> Self {
        Self {
            base: addr.as_u64() & !S::MASK,
            _phantom: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new(self.base)
    }

    /// First address past the page, or `None` if it is not representable.
    #[inline]
    #[must_use]
    pub const fn end(self) -> Option<VirtualAddress> {
        self.base().checked_add(S::SIZE)
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: PageOffset<S>) -> VirtualAddress {
        VirtualAddress::new(self.base + off.as_u64())
    }

    /// The page's byte range.
    #[inline]
    #[must_use]
    pub const fn range(self) -> VirtualRange {
        VirtualRange::from_start_len_saturating(self.base(), S::SIZE)
    }

    /// The page directly following this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.end() {
            Some(end) => Some(Self::containing_address(end)),
            None => None,
        }
    }
}

impl<S> fmt::Display for VirtualPage<S>
where
    S: PageSize,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}/{}", self.base, S::as_str())
    }
}

impl<S: PageSize> fmt::Debug for VirtualPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage<{}>({:#010X})", S::as_str(), self.base)
    }
}

impl<S: PageSize> TryFrom<VirtualAddress> for VirtualPage<S> {
    type Error = VirtualAddress;

    /// Accepts only page-aligned addresses; hands the address back otherwise.
    #[inline]
    fn try_from(va: VirtualAddress) -> Result<Self, VirtualAddress> {
        if (va.as_u64() & S::MASK) == 0 {
            Ok(va.page())
        } else {
            Err(va)
        }
    }
}
