//! # ELF32 Image Builder
//!
//! Writes small, well-formed (or deliberately malformed) ELF32 executables.
//! Used by the test suites of this workspace to produce fixtures without a
//! cross toolchain.
//!
//! Layout of a built image:
//!
//! ```text
//! 0x00  ELF header (52 bytes)
//! 0x34  program header table (32 bytes per segment)
//! ...   segment payloads, 16-byte aligned, each followed by a filler run
//! ```
//!
//! The filler bytes are [`FILLER`], never zero, so a loader that reads past a
//! segment's file-backed length produces visibly wrong page contents.

use crate::header::{ELFCLASS32, ELFDATA2LSB, EM_386, ET_EXEC, EV_CURRENT};
use crate::segment::PHDR_SIZE;
use crate::{ElfHeader, PFlags, SegmentKind};
use std::io;
use std::path::Path;

/// Byte written between and after segment payloads.
pub const FILLER: u8 = 0xAA;

const PAYLOAD_ALIGN: usize = 16;
const FILLER_LEN: usize = 16;

/// Description of one program header to emit.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub kind: SegmentKind,
    pub vaddr: u32,
    pub memsz: u32,
    pub flags: PFlags,
    /// File-backed bytes; `p_filesz` is their length unless overridden.
    pub data: Vec<u8>,
    /// Overrides the emitted `p_filesz`.
    pub filesz: Option<u32>,
    /// Overrides the emitted `p_offset`.
    pub offset: Option<u32>,
}

impl SegmentSpec {
    #[must_use]
    pub fn load(vaddr: u32, memsz: u32, flags: PFlags, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: SegmentKind::Load,
            vaddr,
            memsz,
            flags,
            data: data.into(),
            filesz: None,
            offset: None,
        }
    }
}

/// Builder for ELF32 executable images.
#[derive(Debug, Clone)]
pub struct ElfImageBuilder {
    entry: u32,
    magic: [u8; 4],
    class: u8,
    object_type: u16,
    machine: u16,
    phentsize: u16,
    segments: Vec<SegmentSpec>,
}

impl ElfImageBuilder {
    #[must_use]
    pub const fn new(entry: u32) -> Self {
        Self {
            entry,
            magic: ElfHeader::MAGIC,
            class: ELFCLASS32,
            object_type: ET_EXEC,
            machine: EM_386,
            phentsize: 32,
            segments: Vec::new(),
        }
    }

    #[must_use]
    pub const fn magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }

    #[must_use]
    pub const fn class(mut self, class: u8) -> Self {
        self.class = class;
        self
    }

    #[must_use]
    pub const fn object_type(mut self, object_type: u16) -> Self {
        self.object_type = object_type;
        self
    }

    #[must_use]
    pub const fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    #[must_use]
    pub const fn entry_size(mut self, phentsize: u16) -> Self {
        self.phentsize = phentsize;
        self
    }

    /// Append a `PT_LOAD` segment.
    #[must_use]
    pub fn load(self, vaddr: u32, memsz: u32, flags: PFlags, data: impl Into<Vec<u8>>) -> Self {
        self.segment(SegmentSpec::load(vaddr, memsz, flags, data))
    }

    #[must_use]
    pub fn segment(mut self, spec: SegmentSpec) -> Self {
        self.segments.push(spec);
        self
    }

    /// Serialize the image.
    ///
    /// # Panics
    /// If the image grows past 4 GiB.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn build(&self) -> Vec<u8> {
        let table_len = self.segments.len() * PHDR_SIZE;
        let mut out = vec![0u8; ElfHeader::SIZE + table_len];
        let to_u32 = |v: usize| u32::try_from(v).expect("image exceeds 4 GiB");

        // Payloads first, so the program headers can point at them.
        let mut offsets = Vec::with_capacity(self.segments.len());
        for spec in &self.segments {
            while out.len() % PAYLOAD_ALIGN != 0 {
                out.push(FILLER);
            }
            offsets.push(to_u32(out.len()));
            out.extend_from_slice(&spec.data);
            out.extend(std::iter::repeat_n(FILLER, FILLER_LEN));
        }

        let mut h = Vec::with_capacity(ElfHeader::SIZE);
        h.extend_from_slice(&self.magic);
        h.extend_from_slice(&[self.class, ELFDATA2LSB, 1]);
        h.resize(16, 0);
        h.extend_from_slice(&self.object_type.to_le_bytes());
        h.extend_from_slice(&self.machine.to_le_bytes());
        h.extend_from_slice(&EV_CURRENT.to_le_bytes());
        h.extend_from_slice(&self.entry.to_le_bytes());
        h.extend_from_slice(&to_u32(ElfHeader::SIZE).to_le_bytes()); // e_phoff
        h.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
        h.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        h.extend_from_slice(&u16::try_from(ElfHeader::SIZE).unwrap_or(52).to_le_bytes());
        h.extend_from_slice(&self.phentsize.to_le_bytes());
        h.extend_from_slice(&u16::try_from(self.segments.len()).unwrap_or(u16::MAX).to_le_bytes());
        h.extend_from_slice(&[0u8; 6]); // e_shentsize, e_shnum, e_shstrndx
        out[..ElfHeader::SIZE].copy_from_slice(&h);

        for (i, (spec, data_off)) in self.segments.iter().zip(offsets).enumerate() {
            let filesz = spec.filesz.unwrap_or_else(|| to_u32(spec.data.len()));
            let mut p = Vec::with_capacity(PHDR_SIZE);
            p.extend_from_slice(&u32::from(spec.kind).to_le_bytes());
            p.extend_from_slice(&spec.offset.unwrap_or(data_off).to_le_bytes());
            p.extend_from_slice(&spec.vaddr.to_le_bytes());
            p.extend_from_slice(&spec.vaddr.to_le_bytes()); // p_paddr
            p.extend_from_slice(&filesz.to_le_bytes());
            p.extend_from_slice(&spec.memsz.to_le_bytes());
            p.extend_from_slice(&spec.flags.into_bits().to_le_bytes());
            p.extend_from_slice(&0x1000u32.to_le_bytes());

            let at = ElfHeader::SIZE + i * PHDR_SIZE;
            out[at..at + PHDR_SIZE].copy_from_slice(&p);
        }

        out
    }

    /// Serialize the image into `path`.
    ///
    /// # Errors
    /// Any I/O error from writing the file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.build())
    }
}
