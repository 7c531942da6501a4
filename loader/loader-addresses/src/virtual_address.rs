use crate::{PageOffset, PageSize, VirtualPage};
use core::fmt;
use core::ptr::NonNull;

/// Virtual memory address of the loaded image.
///
/// A thin wrapper around a `u64` that denotes an address in the target
/// program's (32-bit) virtual address space, which is also the address the
/// loader maps pages at. Keeping it at 64 bits lets all arithmetic be checked
/// instead of silently wrapping at the 32-bit boundary.
///
/// ### Semantics
/// - Use [`VirtualAddress::page`] / [`VirtualAddress::offset`] / [`VirtualAddress::split`]
///   to derive the page base and the in-page offset for a concrete [`PageSize`].
/// - Use [`VirtualAddress::as_host_ptr`] to obtain a host pointer; it fails when
///   the address cannot be represented on the host.
///
/// ### Examples
/// ```rust
/// # use loader_addresses::*;
/// let va = VirtualAddress::new(0x0804_9abc);
/// let (vp, off) = va.split::<Size4K>();
/// assert_eq!(vp.base().as_u64(), 0x0804_9000);
/// assert_eq!(off.as_u64(), 0xabc);
/// assert_eq!(vp.join(off), va);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr.expose_provenance() as u64)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn page<S: PageSize>(self) -> VirtualPage<S> {
        VirtualPage::containing_address(self)
    }

    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> PageOffset<S> {
        PageOffset::new(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn split<S: PageSize>(self) -> (VirtualPage<S>, PageOffset<S>) {
        (self.page::<S>(), self.offset::<S>())
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Number of bytes from `origin` up to `self`, or `None` if `self` lies below `origin`.
    #[inline]
    #[must_use]
    pub const fn distance_from(self, origin: Self) -> Option<u64> {
        self.0.checked_sub(origin.0)
    }

    /// Convert to a host pointer.
    ///
    /// Returns `None` for the null address and for addresses wider than the
    /// host's pointer width.
    #[inline]
    #[must_use]
    pub fn as_host_ptr<T>(self) -> Option<NonNull<T>> {
        let addr = usize::try_from(self.0).ok()?;
        NonNull::new(core::ptr::with_exposed_provenance_mut::<T>(addr))
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:08X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl fmt::LowerHex for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<u32> for VirtualAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(u64::from(v))
    }
}

impl From<VirtualAddress> for u64 {
    #[inline]
    fn from(a: VirtualAddress) -> Self {
        a.as_u64()
    }
}

impl<S> From<VirtualPage<S>> for VirtualAddress
where
    S: PageSize,
{
    fn from(value: VirtualPage<S>) -> Self {
        value.base()
    }
}
