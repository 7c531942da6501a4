use crate::{PageSize, VirtualAddress, VirtualPage};
use core::fmt;
use core::marker::PhantomData;

/// Half-open virtual address range `[start, end)`.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct VirtualRange {
    start: VirtualAddress,
    end: VirtualAddress,
}

impl VirtualRange {
    /// Range from `start` up to (excluding) `end`. An inverted pair yields an empty range at `start`.
    #[inline]
    #[must_use]
    pub const fn new(start: VirtualAddress, end: VirtualAddress) -> Self {
        if end.as_u64() < start.as_u64() {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Range of `len` bytes at `start`, or `None` if the end overflows.
    #[inline]
    #[must_use]
    pub const fn from_start_len(start: VirtualAddress, len: u64) -> Option<Self> {
        match start.checked_add(len) {
            Some(end) => Some(Self { start, end }),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) const fn from_start_len_saturating(start: VirtualAddress, len: u64) -> Self {
        Self {
            start,
            end: VirtualAddress::new(start.as_u64().saturating_add(len)),
        }
    }

    #[inline]
    #[must_use]
    pub const fn start(self) -> VirtualAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(self) -> VirtualAddress {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn len(self) -> u64 {
        self.end.as_u64() - self.start.as_u64()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, addr: VirtualAddress) -> bool {
        addr.as_u64() >= self.start.as_u64() && addr.as_u64() < self.end.as_u64()
    }

    /// Overlapping part of both ranges, or `None` if they are disjoint.
    #[inline]
    #[must_use]
    pub const fn intersect(self, other: Self) -> Option<Self> {
        let start = if self.start.as_u64() > other.start.as_u64() {
            self.start
        } else {
            other.start
        };
        let end = if self.end.as_u64() < other.end.as_u64() {
            self.end
        } else {
            other.end
        };
        if start.as_u64() < end.as_u64() {
            Some(Self { start, end })
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.intersect(other).is_some()
    }

    /// Number of `S` pages touched by this range (zero for an empty range).
    #[inline]
    #[must_use]
    pub const fn page_count<S: PageSize>(self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let first = self.start.as_u64() >> S::SHIFT;
        let last = (self.end.as_u64() - 1) >> S::SHIFT;
        last - first + 1
    }

    /// Iterate over every `S` page touched by this range, in ascending order.
    #[inline]
    #[must_use]
    pub const fn pages<S: PageSize>(self) -> Pages<S> {
        Pages {
            next: self.start.as_u64() & !S::MASK,
            remaining: self.page_count::<S>(),
            _phantom: PhantomData,
        }
    }
}

impl fmt::Debug for VirtualRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualRange({}..{})", self.start, self.end)
    }
}

impl fmt::Display for VirtualRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Iterator over the pages of a [`VirtualRange`].
#[derive(Clone)]
pub struct Pages<S: PageSize> {
    next: u64,
    remaining: u64,
    _phantom: PhantomData<S>,
}

impl<S: PageSize> Iterator for Pages<S> {
    type Item = VirtualPage<S>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let page = VirtualAddress::new(self.next).page::<S>();
        self.remaining -= 1;
        self.next = self.next.wrapping_add(S::SIZE);
        Some(page)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let exact = usize::try_from(self.remaining).ok();
        (exact.unwrap_or(usize::MAX), exact)
    }
}
