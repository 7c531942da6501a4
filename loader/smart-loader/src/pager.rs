//! # Demand Pager
//!
//! Resolves one page per fault:
//!
//! 1. check that a loadable segment owns the faulting address,
//! 2. refuse pages that are already resident,
//! 3. map a zero page at the page base,
//! 4. copy in the file-backed bytes of every loadable segment sharing the
//!    page, leaving everything past `p_filesz` zero,
//! 5. account the bytes of the page no segment covers as fragmentation,
//! 6. apply the union of the sharing segments' permissions.
//!
//! All of this runs in signal context: no allocation, no locks, no buffered
//! I/O. File contents are read with positional reads on the already-open
//! executable.

use crate::coverage::PageCoverage;
use crate::{ExecutionStats, FaultError, FaultJournal, ResidentPages};
use core::ptr::NonNull;
use loader_addresses::{PageSize, Size4K, VirtualAddress, VirtualPage};
use loader_elf::{ElfFile, PFlags, Segment, SegmentTable};
use loader_host::{Errno, FaultHandler, FaultInfo, PageHost, Protection};

const PAGE_LEN: usize = Size4K::SIZE as usize;

/// Outcome of one resolved fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFill {
    pub page: VirtualPage<Size4K>,
    /// Bytes copied from the file.
    pub file_bytes: u64,
    /// Bytes of the page outside every loadable segment.
    pub fragmentation: u64,
    pub protection: Protection,
}

/// Page access rights granted by a segment's `p_flags`.
#[must_use]
pub const fn protection_for(flags: PFlags) -> Protection {
    Protection::new()
        .with_read(flags.read())
        .with_write(flags.write())
        .with_execute(flags.execute())
}

/// Fault handler state: the open executable, its segments, and the
/// bookkeeping the trap updates.
#[derive(Debug)]
pub struct DemandPager<H: PageHost> {
    file: ElfFile,
    segments: SegmentTable,
    resident: ResidentPages,
    stats: ExecutionStats,
    journal: FaultJournal,
    host: H,
}

impl<H: PageHost> DemandPager<H> {
    /// Prepare paging for `segments` of `file`; everything the trap needs is
    /// allocated here.
    #[must_use]
    pub fn new(file: ElfFile, segments: SegmentTable, host: H, journal_capacity: usize) -> Self {
        let resident = ResidentPages::for_segments(&segments);
        Self {
            file,
            segments,
            resident,
            stats: ExecutionStats::new(),
            journal: FaultJournal::with_capacity(journal_capacity),
            host,
        }
    }

    #[must_use]
    pub const fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    #[must_use]
    pub const fn resident(&self) -> &ResidentPages {
        &self.resident
    }

    #[must_use]
    pub const fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    #[must_use]
    pub const fn journal(&self) -> &FaultJournal {
        &self.journal
    }

    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Map and fill the page containing `address`.
    ///
    /// # Errors
    /// Any [`FaultError`]; the page is left in an unspecified state and the
    /// statistics untouched.
    pub fn resolve(&self, address: VirtualAddress) -> Result<PageFill, FaultError> {
        let page = address.page::<Size4K>();

        if self.segments.find_segment(address).is_none() {
            return Err(FaultError::SegmentNotFound(address));
        }
        let slot = self
            .resident
            .slot(page)
            .ok_or(FaultError::SegmentNotFound(address))?;

        if self.resident.is_resident(slot) {
            return Err(FaultError::ProtectionViolation {
                address,
                page,
                protection: self.protection_of(page),
            });
        }

        // SAFETY: The page is spanned by a loadable segment, hence reserved,
        // and was never handed out, so nothing references it.
        let frame = unsafe { self.host.map_zeroed(page) }.map_err(FaultError::Mapping)?;

        let mut coverage = PageCoverage::new(page);
        let mut protection = Protection::none();
        let mut file_bytes = 0;

        // Reverse file order: where segments overlap, the first one listed
        // writes last and provides the bytes.
        for segment in self.segments.loadable_in_page(page).rev() {
            file_bytes += self.copy_file_bytes(segment, page, frame)?;
            coverage.cover(segment.memory_range());
            protection = protection.union(protection_for(segment.flags));
        }

        let fragmentation = coverage.uncovered();

        // SAFETY: As above; no pointer into the page outlives this call.
        unsafe { self.host.protect(page, protection) }.map_err(FaultError::Permission)?;

        self.resident.mark(slot);
        self.stats.record(fragmentation);

        let fill = PageFill {
            page,
            file_bytes,
            fragmentation,
            protection,
        };
        self.journal.record(&fill);
        Ok(fill)
    }

    /// Copy the part of `segment`'s file-backed bytes that lies in `page`
    /// into the freshly mapped `frame`. Returns the number of bytes copied.
    fn copy_file_bytes(
        &self,
        segment: &Segment,
        page: VirtualPage<Size4K>,
        frame: NonNull<u8>,
    ) -> Result<u64, FaultError> {
        let Some(part) = segment.file_range().intersect(page.range()) else {
            return Ok(0);
        };

        let start = part.start().offset::<Size4K>().as_usize();
        let len = usize::try_from(part.len()).unwrap_or(PAGE_LEN);
        let into_segment = part.start().distance_from(segment.vaddr).unwrap_or(0);
        let offset = segment.offset + into_segment;

        let read_error = |errno| FaultError::ContentRead {
            page,
            offset,
            len: part.len(),
            errno,
        };

        // SAFETY: `frame` is a writable, exclusively owned 4 KiB page.
        let bytes = unsafe { core::slice::from_raw_parts_mut(frame.as_ptr(), PAGE_LEN) };
        let dst = bytes
            .get_mut(start..start + len)
            .ok_or(read_error(Errno(libc::EINVAL)))?;

        self.file
            .read_exact_at(dst, offset)
            .map_err(|e| read_error(Errno::from(&e)))?;
        Ok(part.len())
    }

    /// Union of the permissions of all loadable segments in `page`.
    fn protection_of(&self, page: VirtualPage<Size4K>) -> Protection {
        self.segments
            .loadable_in_page(page)
            .fold(Protection::none(), |acc, s| acc.union(protection_for(s.flags)))
    }
}

impl<H: PageHost> FaultHandler for DemandPager<H> {
    type Error = FaultError;

    fn handle_fault(&self, fault: &FaultInfo) -> Result<(), FaultError> {
        self.resolve(fault.address).map(|_| ())
    }

    fn exit_status(&self, error: &FaultError) -> i32 {
        i32::from(error.exit_code())
    }
}
