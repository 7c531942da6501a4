//! # Segment Table and Segment Locator

use crate::segment::PHDR_SIZE;
use crate::{ElfError, Segment};
use loader_addresses::{Size4K, VirtualAddress, VirtualPage};

/// Program header table, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentTable {
    segments: Vec<Segment>,
}

impl SegmentTable {
    #[must_use]
    pub const fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Decode `count` consecutive program headers from `bytes`.
    ///
    /// Trailing bytes that do not form a whole entry are ignored.
    #[must_use]
    pub fn parse(bytes: &[u8], count: usize) -> Self {
        let segments = bytes
            .chunks_exact(PHDR_SIZE)
            .take(count)
            .filter_map(|chunk| <&[u8; PHDR_SIZE]>::try_from(chunk).ok())
            .map(Segment::parse)
            .collect();
        Self { segments }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// `PT_LOAD` segments in file order.
    pub fn loadable(&self) -> impl DoubleEndedIterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_loadable())
    }

    /// The loadable segment whose in-memory extent contains `addr`.
    ///
    /// Linear scan in file order; if segments overlap, the first one listed wins.
    #[must_use]
    pub fn find_segment(&self, addr: VirtualAddress) -> Option<&Segment> {
        self.loadable().find(|s| s.contains(addr))
    }

    /// Loadable segments whose in-memory extent intersects `page`, in file order.
    pub fn loadable_in_page(
        &self,
        page: VirtualPage<Size4K>,
    ) -> impl DoubleEndedIterator<Item = &Segment> {
        let range = page.range();
        self.loadable()
            .filter(move |s| s.memory_range().overlaps(range))
    }

    /// Indices of the first pair of loadable segments whose in-memory extents overlap.
    #[must_use]
    pub fn first_overlap(&self) -> Option<(usize, usize)> {
        let loadable: Vec<_> = self
            .segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_loadable())
            .collect();

        loadable.iter().enumerate().find_map(|(n, (i, a))| {
            loadable[n + 1..]
                .iter()
                .find(|(_, b)| a.memory_range().overlaps(b.memory_range()))
                .map(|(j, _)| (*i, *j))
        })
    }

    /// Check that every loadable segment is addressable in 32 bits and that
    /// its file-backed bytes lie within a file of `file_len` bytes.
    ///
    /// # Errors
    /// [`ElfError::AddressOverflow`] or [`ElfError::SegmentOutOfBounds`] for the first offender.
    pub fn validate(&self, file_len: u64) -> Result<(), ElfError> {
        for (index, seg) in self.segments.iter().enumerate() {
            if !seg.is_loadable() {
                continue;
            }

            let end = seg
                .vaddr
                .as_u64()
                .checked_add(seg.memsz)
                .ok_or(ElfError::AddressOverflow { index })?;
            if end > 1 << 32 {
                return Err(ElfError::AddressOverflow { index });
            }

            let file_end = seg
                .offset
                .checked_add(seg.file_backed_len())
                .ok_or(ElfError::SegmentOutOfBounds {
                    index,
                    end: u64::MAX,
                    file_len,
                })?;
            if file_end > file_len {
                return Err(ElfError::SegmentOutOfBounds {
                    index,
                    end: file_end,
                    file_len,
                });
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SegmentTable {
    type Item = &'a Segment;
    type IntoIter = core::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
