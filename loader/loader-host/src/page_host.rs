//! # Host Paging Primitives
//!
//! The fault handler maps, fills and protects one page at a time. It does so
//! through [`PageHost`] so the paging logic can be tested without touching
//! the real address space. [`LibcHost`] is the production implementation on
//! top of `mmap(2)`, `mprotect(2)` and `munmap(2)`.

use crate::{Errno, HostError, Protection};
use core::ffi::c_void;
use core::ptr::NonNull;
use loader_addresses::{PageSize, Size4K, VirtualAddress, VirtualPage, VirtualRange};
use log::debug;

/// Page mapping capability.
///
/// Implementations used from the fault trap must not allocate or lock.
pub trait PageHost {
    /// Claim `range` as inaccessible address space, failing if any part of it
    /// is already mapped.
    ///
    /// # Errors
    /// [`HostError::AddressConflict`] if the range is occupied, otherwise
    /// [`HostError::Reserve`] or [`HostError::Unrepresentable`].
    fn reserve(&self, range: VirtualRange) -> Result<(), HostError>;

    /// Map a fresh zero-filled page at `page`, readable, writable and
    /// executable, replacing whatever was mapped there.
    ///
    /// # Safety
    /// `page` must lie within a range previously reserved through this host,
    /// and no Rust reference may point into it.
    ///
    /// # Errors
    /// [`HostError::Map`] or [`HostError::Unrepresentable`].
    unsafe fn map_zeroed(&self, page: VirtualPage<Size4K>) -> Result<NonNull<u8>, HostError>;

    /// Change the access rights of a mapped page.
    ///
    /// # Safety
    /// As for [`PageHost::map_zeroed`]; revoking rights invalidates any
    /// pointer the caller still uses for that kind of access.
    ///
    /// # Errors
    /// [`HostError::Protect`] or [`HostError::Unrepresentable`].
    unsafe fn protect(
        &self,
        page: VirtualPage<Size4K>,
        protection: Protection,
    ) -> Result<(), HostError>;

    /// Unmap `range`, reservation and populated pages alike.
    ///
    /// # Safety
    /// Nothing may still use memory inside `range`.
    ///
    /// # Errors
    /// [`HostError::Release`] or [`HostError::Unrepresentable`].
    unsafe fn release(&self, range: VirtualRange) -> Result<(), HostError>;
}

impl<H: PageHost + ?Sized> PageHost for &H {
    fn reserve(&self, range: VirtualRange) -> Result<(), HostError> {
        (**self).reserve(range)
    }

    unsafe fn map_zeroed(&self, page: VirtualPage<Size4K>) -> Result<NonNull<u8>, HostError> {
        // SAFETY: Forwarded contract.
        unsafe { (**self).map_zeroed(page) }
    }

    unsafe fn protect(
        &self,
        page: VirtualPage<Size4K>,
        protection: Protection,
    ) -> Result<(), HostError> {
        // SAFETY: Forwarded contract.
        unsafe { (**self).protect(page, protection) }
    }

    unsafe fn release(&self, range: VirtualRange) -> Result<(), HostError> {
        // SAFETY: Forwarded contract.
        unsafe { (**self).release(range) }
    }
}

/// [`PageHost`] backed by the process's own address space.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcHost;

impl LibcHost {
    /// Create the host after checking that it pages in 4 KiB units.
    ///
    /// # Errors
    /// [`HostError::PageSize`] on any other page size.
    pub fn new() -> Result<Self, HostError> {
        let size = host_page_size();
        if size != Size4K::SIZE {
            return Err(HostError::PageSize(size));
        }
        Ok(Self)
    }
}

/// The host's page size as reported by `sysconf(_SC_PAGESIZE)`; 0 if unknown.
#[must_use]
pub fn host_page_size() -> u64 {
    // SAFETY: `sysconf` has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(size).unwrap_or(0)
}

fn host_ptr(addr: VirtualAddress) -> Result<*mut c_void, HostError> {
    addr.as_host_ptr::<c_void>()
        .map(NonNull::as_ptr)
        .ok_or(HostError::Unrepresentable(addr))
}

fn host_len(range: VirtualRange) -> Result<usize, HostError> {
    usize::try_from(range.len()).map_err(|_| HostError::Unrepresentable(range.end()))
}

const PAGE_LEN: usize = Size4K::SIZE as usize;

impl PageHost for LibcHost {
    fn reserve(&self, range: VirtualRange) -> Result<(), HostError> {
        if range.is_empty() {
            return Ok(());
        }

        let addr = host_ptr(range.start())?;
        let len = host_len(range)?;

        // SAFETY: MAP_FIXED_NOREPLACE never replaces an existing mapping.
        let mapped = unsafe {
            libc::mmap(
                addr,
                len,
                libc::PROT_NONE,
                libc::MAP_PRIVATE
                    | libc::MAP_ANONYMOUS
                    | libc::MAP_NORESERVE
                    | libc::MAP_FIXED_NOREPLACE,
                -1,
                0,
            )
        };

        if mapped == libc::MAP_FAILED {
            let errno = Errno::last();
            return Err(if errno.0 == libc::EEXIST {
                HostError::AddressConflict { range }
            } else {
                HostError::Reserve { range, errno }
            });
        }

        // Kernels before 4.17 treat the flag as a hint and map elsewhere.
        if mapped != addr {
            // SAFETY: `mapped` is the mapping just created, nobody else knows it.
            unsafe { libc::munmap(mapped, len) };
            return Err(HostError::AddressConflict { range });
        }

        debug!("Reserved {range}");
        Ok(())
    }

    unsafe fn map_zeroed(&self, page: VirtualPage<Size4K>) -> Result<NonNull<u8>, HostError> {
        let addr = host_ptr(page.base())?;

        // SAFETY: The caller guarantees the page belongs to our reservation.
        let mapped = unsafe {
            libc::mmap(
                addr,
                PAGE_LEN,
                Protection::all().to_prot(),
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED,
                -1,
                0,
            )
        };

        if mapped == libc::MAP_FAILED {
            return Err(HostError::Map {
                page,
                errno: Errno::last(),
            });
        }

        NonNull::new(mapped.cast::<u8>()).ok_or(HostError::Unrepresentable(page.base()))
    }

    unsafe fn protect(
        &self,
        page: VirtualPage<Size4K>,
        protection: Protection,
    ) -> Result<(), HostError> {
        let addr = host_ptr(page.base())?;

        // SAFETY: The caller guarantees the page belongs to our reservation.
        if unsafe { libc::mprotect(addr, PAGE_LEN, protection.to_prot()) } != 0 {
            return Err(HostError::Protect {
                page,
                protection,
                errno: Errno::last(),
            });
        }
        Ok(())
    }

    unsafe fn release(&self, range: VirtualRange) -> Result<(), HostError> {
        if range.is_empty() {
            return Ok(());
        }

        let addr = host_ptr(range.start())?;
        let len = host_len(range)?;

        // SAFETY: The caller guarantees the range is ours and unused.
        if unsafe { libc::munmap(addr, len) } != 0 {
            return Err(HostError::Release {
                range,
                errno: Errno::last(),
            });
        }

        debug!("Released {range}");
        Ok(())
    }
}
