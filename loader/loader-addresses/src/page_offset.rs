use crate::PageSize;
use core::fmt;
use core::marker::PhantomData;

/// Byte offset inside a page of size `S`.
///
/// Always strictly less than `S::SIZE`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageOffset<S: PageSize> {
    value: u64,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> PageOffset<S> {
    /// Create from a raw value, keeping only the in-page bits.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self {
            value: value & S::MASK,
            _phantom: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.value
    }

    /// The offset as a slice index. Lossless: the value is below the page size.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_usize(self) -> usize {
        self.value as usize
    }

    /// Bytes from this offset to the end of the page.
    #[inline]
    #[must_use]
    pub const fn remaining(self) -> u64 {
        S::SIZE - self.value
    }
}

impl<S: PageSize> fmt::Debug for PageOffset<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageOffset<{}>({:#x})", S::as_str(), self.value)
    }
}

impl<S: PageSize> fmt::Display for PageOffset<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:#x}", self.value)
    }
}
