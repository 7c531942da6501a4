//! Shared fixtures: an in-memory page host and ELF image files.

#![allow(dead_code)]

use core::cell::{Cell, RefCell};
use core::ptr::NonNull;
use loader_addresses::{Size4K, VirtualAddress, VirtualPage, VirtualRange};
use loader_elf::builder::ElfImageBuilder;
use loader_host::{Errno, HostError, PageHost, Protection};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tempfile::TempDir;

/// Page host that keeps pages in heap buffers instead of the address space.
#[derive(Default)]
pub struct MockHost {
    frames: RefCell<BTreeMap<u64, Box<[u8; 4096]>>>,
    protections: RefCell<BTreeMap<u64, Protection>>,
    reserved: RefCell<Vec<VirtualRange>>,
    released: RefCell<Vec<VirtualRange>>,
    pub fail_map: Cell<bool>,
    pub fail_protect: Cell<bool>,
}

impl MockHost {
    /// Pretend something else already occupies `range`.
    pub fn occupy(&self, range: VirtualRange) {
        self.reserved.borrow_mut().push(range);
    }

    /// Contents of the mapped page at `base`.
    pub fn page(&self, base: u64) -> Option<[u8; 4096]> {
        self.frames.borrow().get(&base).map(|f| **f)
    }

    pub fn protection(&self, base: u64) -> Option<Protection> {
        self.protections.borrow().get(&base).copied()
    }

    pub fn mapped_pages(&self) -> Vec<u64> {
        self.frames.borrow().keys().copied().collect()
    }

    pub fn reserved(&self) -> Vec<VirtualRange> {
        self.reserved.borrow().clone()
    }

    pub fn released(&self) -> Vec<VirtualRange> {
        self.released.borrow().clone()
    }
}

impl PageHost for MockHost {
    fn reserve(&self, range: VirtualRange) -> Result<(), HostError> {
        let mut reserved = self.reserved.borrow_mut();
        if reserved.iter().any(|r| r.overlaps(range)) {
            return Err(HostError::AddressConflict { range });
        }
        reserved.push(range);
        Ok(())
    }

    unsafe fn map_zeroed(&self, page: VirtualPage<Size4K>) -> Result<NonNull<u8>, HostError> {
        if self.fail_map.get() {
            return Err(HostError::Map {
                page,
                errno: Errno(libc::ENOMEM),
            });
        }
        let mut frames = self.frames.borrow_mut();
        let frame = frames
            .entry(page.base().as_u64())
            .or_insert_with(|| Box::new([0; 4096]));
        frame.fill(0);
        Ok(NonNull::from(&mut **frame).cast::<u8>())
    }

    unsafe fn protect(
        &self,
        page: VirtualPage<Size4K>,
        protection: Protection,
    ) -> Result<(), HostError> {
        if self.fail_protect.get() {
            return Err(HostError::Protect {
                page,
                protection,
                errno: Errno(libc::EACCES),
            });
        }
        self.protections
            .borrow_mut()
            .insert(page.base().as_u64(), protection);
        Ok(())
    }

    unsafe fn release(&self, range: VirtualRange) -> Result<(), HostError> {
        self.released.borrow_mut().push(range);
        Ok(())
    }
}

/// An image written to a temporary directory.
pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    pub fn write(image: &ElfImageBuilder) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.elf");
        image.write_to(&path).unwrap();
        Self { _dir: dir, path }
    }
}

pub fn addr(v: u64) -> VirtualAddress {
    VirtualAddress::new(v)
}

pub fn range(start: u64, end: u64) -> VirtualRange {
    VirtualRange::new(addr(start), addr(end))
}
