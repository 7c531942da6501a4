//! # ELF32 Program Headers

use core::mem::size_of;
use core::ptr::read_unaligned;
use loader_addresses::{Size4K, VirtualAddress, VirtualRange};

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(clippy::struct_field_names, dead_code)]
struct Elf32Phdr {
    p_type: u32,
    p_offset: u32,
    p_vaddr: u32,
    p_paddr: u32,
    p_filesz: u32,
    p_memsz: u32,
    p_flags: u32,
    p_align: u32,
}

/// On-disk size of one ELF32 program header.
pub const PHDR_SIZE: usize = 32;

const _: () = assert!(size_of::<Elf32Phdr>() == PHDR_SIZE);

pub const PT_NULL: u32 = 0;
pub const PT_LOAD: u32 = 1;
pub const PT_DYNAMIC: u32 = 2;
pub const PT_INTERP: u32 = 3;
pub const PT_NOTE: u32 = 4;
pub const PT_PHDR: u32 = 6;
pub const PT_TLS: u32 = 7;

/// Program header type tag. Only [`SegmentKind::Load`] takes part in paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Null,
    Load,
    Dynamic,
    Interp,
    Note,
    Phdr,
    Tls,
    Other(u32),
}

impl From<u32> for SegmentKind {
    fn from(value: u32) -> Self {
        match value {
            PT_NULL => Self::Null,
            PT_LOAD => Self::Load,
            PT_DYNAMIC => Self::Dynamic,
            PT_INTERP => Self::Interp,
            PT_NOTE => Self::Note,
            PT_PHDR => Self::Phdr,
            PT_TLS => Self::Tls,
            other => Self::Other(other),
        }
    }
}

impl From<SegmentKind> for u32 {
    fn from(value: SegmentKind) -> Self {
        match value {
            SegmentKind::Null => PT_NULL,
            SegmentKind::Load => PT_LOAD,
            SegmentKind::Dynamic => PT_DYNAMIC,
            SegmentKind::Interp => PT_INTERP,
            SegmentKind::Note => PT_NOTE,
            SegmentKind::Phdr => PT_PHDR,
            SegmentKind::Tls => PT_TLS,
            SegmentKind::Other(other) => other,
        }
    }
}

/// One entry of the program header table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub vaddr: VirtualAddress,
    /// Size of the segment in memory.
    pub memsz: u64,
    /// File offset of the segment's first byte.
    pub offset: u64,
    /// Size of the segment in the file.
    pub filesz: u64,
    pub flags: PFlags,
    pub align: u64,
}

impl Segment {
    /// Decode one program header from exactly [`PHDR_SIZE`] bytes.
    #[must_use]
    pub fn parse(bytes: &[u8; PHDR_SIZE]) -> Self {
        // SAFETY: The buffer has exactly the size of the header; all fields are plain integers.
        let ph = unsafe { read_unaligned(bytes.as_ptr().cast::<Elf32Phdr>()) };
        Self {
            kind: SegmentKind::from(ph.p_type),
            vaddr: VirtualAddress::from(ph.p_vaddr),
            memsz: u64::from(ph.p_memsz),
            offset: u64::from(ph.p_offset),
            filesz: u64::from(ph.p_filesz),
            flags: PFlags::from_bits(ph.p_flags),
            align: u64::from(ph.p_align),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_loadable(&self) -> bool {
        self.kind == SegmentKind::Load
    }

    /// Bytes of the in-memory image that come from the file.
    ///
    /// A `p_filesz` larger than `p_memsz` is clamped; anything past `p_memsz`
    /// is never part of the segment.
    #[inline]
    #[must_use]
    pub const fn file_backed_len(&self) -> u64 {
        if self.filesz < self.memsz {
            self.filesz
        } else {
            self.memsz
        }
    }

    /// In-memory extent `[vaddr, vaddr + memsz)`.
    #[inline]
    #[must_use]
    pub const fn memory_range(&self) -> VirtualRange {
        VirtualRange::new(
            self.vaddr,
            VirtualAddress::new(self.vaddr.as_u64().saturating_add(self.memsz)),
        )
    }

    /// File-backed extent `[vaddr, vaddr + file_backed_len)`.
    #[inline]
    #[must_use]
    pub const fn file_range(&self) -> VirtualRange {
        VirtualRange::new(
            self.vaddr,
            VirtualAddress::new(self.vaddr.as_u64().saturating_add(self.file_backed_len())),
        )
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, addr: VirtualAddress) -> bool {
        self.memory_range().contains(addr)
    }

    /// Number of 4 KiB pages the in-memory extent touches.
    #[inline]
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        self.memory_range().page_count::<Size4K>()
    }
}

/// Bitfield wrapper for `Elf32_Phdr.p_flags` (32-bit)
///
/// Layout (LSB→MSB):
/// - bit 0: execute
/// - bit 1: write
/// - bit 2: read
/// - bits 3..31: reserved (OS / processor specific)
#[bitfield_struct::bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PFlags {
    #[bits(1)]
    pub execute: bool,
    #[bits(1)]
    pub write: bool,
    #[bits(1)]
    pub read: bool,
    #[bits(29)]
    __: u32,
}

impl PFlags {
    /// `R-X`, the usual text segment.
    #[must_use]
    pub const fn text() -> Self {
        Self::new().with_read(true).with_execute(true)
    }

    /// `RW-`, the usual data / bss segment.
    #[must_use]
    pub const fn data() -> Self {
        Self::new().with_read(true).with_write(true)
    }

    /// `R--`
    #[must_use]
    pub const fn read_only() -> Self {
        Self::new().with_read(true)
    }
}
