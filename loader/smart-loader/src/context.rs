//! # Loader Context
//!
//! Everything one run owns: the validated header, the demand pager, and the
//! address-space reservation covering every page the target may touch.
//! Dropping the context releases the reservation and closes the file.

use crate::{DemandPager, LoaderError};
use core::ffi::c_int;
use loader_addresses::{VirtualAddress, VirtualRange};
use loader_elf::{ElfFile, ElfHeader, HOST_MACHINE};
use loader_host::{HostError, LibcHost, PageHost, with_fault_trap};
use log::{debug, info, warn};
use std::path::Path;

pub struct LoaderContext<H: PageHost = LibcHost> {
    header: ElfHeader,
    pager: DemandPager<H>,
    reserved: Vec<VirtualRange>,
}

impl<H: PageHost> LoaderContext<H> {
    /// Open and validate the executable at `path` and reserve its address
    /// ranges through `host`.
    ///
    /// # Errors
    /// [`LoaderError::Open`] or [`LoaderError::Format`] for unusable files,
    /// [`LoaderError::Host`] if a segment's pages cannot be reserved.
    pub fn open(
        path: impl AsRef<Path>,
        host: H,
        journal_capacity: usize,
    ) -> Result<Self, LoaderError> {
        let mut file = ElfFile::open(path)?;
        let header = file.read_header()?;
        let segments = file.read_segments(&header)?;

        let pager = DemandPager::new(file, segments, host, journal_capacity);
        let spans: Vec<_> = pager.resident().spans().collect();
        debug!(
            "{} loadable segments spanning {} pages in {} ranges",
            pager.segments().loadable().count(),
            pager.resident().len(),
            spans.len()
        );

        let mut context = Self {
            header,
            pager,
            reserved: Vec::with_capacity(spans.len()),
        };

        // On failure, dropping `context` releases what was reserved so far.
        for span in spans {
            context.pager.host().reserve(span)?;
            context.reserved.push(span);
        }

        Ok(context)
    }

    #[must_use]
    pub const fn pager(&self) -> &DemandPager<H> {
        &self.pager
    }

    /// Address ranges held inaccessible until first touch.
    #[must_use]
    pub fn reserved(&self) -> &[VirtualRange] {
        &self.reserved
    }

    /// Check that this process can execute the image's instructions.
    ///
    /// # Errors
    /// [`LoaderError::MachineMismatch`].
    pub fn check_machine(&self) -> Result<(), LoaderError> {
        if HOST_MACHINE == Some(self.header.machine) {
            Ok(())
        } else {
            Err(LoaderError::MachineMismatch {
                found: self.header.machine,
                expected: HOST_MACHINE,
            })
        }
    }

    /// The entry address, if it lies in a loadable, executable segment.
    ///
    /// # Errors
    /// [`LoaderError::MissingEntryPoint`] otherwise, including for a zero entry.
    pub fn entry_point(&self) -> Result<VirtualAddress, LoaderError> {
        let entry = self.header.entry;
        let executable = !entry.is_null()
            && self
                .pager
                .segments()
                .find_segment(entry)
                .is_some_and(|s| s.flags.execute());

        if executable {
            Ok(entry)
        } else {
            Err(LoaderError::MissingEntryPoint(entry))
        }
    }
}

impl LoaderContext<LibcHost> {
    /// Jump to the entry point with the fault trap armed and return the
    /// program's return value.
    ///
    /// # Safety
    /// Runs the target's machine code inside this process. The image must be
    /// trusted and built for [`LoaderContext::check_machine`]'s architecture.
    ///
    /// # Errors
    /// [`LoaderError::MissingEntryPoint`], or [`LoaderError::Host`] if the
    /// trap cannot be armed. Faults the pager cannot resolve do not return.
    pub unsafe fn execute(&self) -> Result<c_int, LoaderError> {
        let entry = self.entry_point()?;
        let code = entry
            .as_host_ptr::<u8>()
            .ok_or(HostError::Unrepresentable(entry))?;

        // SAFETY: The caller vouches for the image; the entry lies in an
        // executable segment whose pages arrive on first instruction fetch.
        let start: extern "C" fn() -> c_int = unsafe { core::mem::transmute(code.as_ptr()) };

        info!("Jumping to entry point {entry}");
        let value = with_fault_trap(&self.pager, || start())?;
        info!("Program returned {value}");
        Ok(value)
    }
}

impl<H: PageHost> Drop for LoaderContext<H> {
    fn drop(&mut self) {
        for span in self.reserved.drain(..) {
            // SAFETY: The target has returned; nothing uses its pages anymore.
            if let Err(e) = unsafe { self.pager.host().release(span) } {
                warn!("{e}");
            }
        }
    }
}
