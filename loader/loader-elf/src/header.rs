//! # ELF32 File Header

use crate::ElfError;
use core::mem::size_of;
use core::ptr::read_unaligned;
use loader_addresses::VirtualAddress;

// Minimal ELF32 definitions
#[repr(C)]
#[derive(Clone, Copy)]
#[allow(clippy::struct_field_names, dead_code)]
struct Elf32Ehdr {
    e_ident: [u8; 16],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u32,
    e_phoff: u32,
    e_shoff: u32,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

const _: () = assert!(size_of::<Elf32Ehdr>() == ElfHeader::SIZE);
const _: () = assert!(
    cfg!(target_endian = "little"),
    "ELF32 images are decoded in place and must match the host byte order"
);

pub const ELFCLASS32: u8 = 1;
pub const ELFDATA2LSB: u8 = 1;
pub const EV_CURRENT: u32 = 1;
pub const ET_EXEC: u16 = 2;
pub const EM_386: u16 = 3;
pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;

/// `e_machine` of code this process can execute directly, if known.
pub const HOST_MACHINE: Option<u16> = if cfg!(target_arch = "x86") {
    Some(EM_386)
} else if cfg!(target_arch = "x86_64") {
    Some(EM_X86_64)
} else if cfg!(target_arch = "aarch64") {
    Some(EM_AARCH64)
} else {
    None
};

/// Validated ELF32 file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    pub magic: [u8; 4],
    pub class: u8,
    pub data: u8,
    pub version: u32,
    pub object_type: u16,
    pub machine: u16,
    pub entry: VirtualAddress,
    /// File offset of the program header table.
    pub phoff: u64,
    /// Size of one program header table entry.
    pub phentsize: u16,
    /// Number of program header table entries.
    pub phnum: u16,
}

impl ElfHeader {
    /// On-disk size of an ELF32 file header.
    pub const SIZE: usize = 52;

    pub const MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

    /// Decode and validate the 52 header bytes.
    ///
    /// The magic is checked before anything else is looked at.
    ///
    /// # Errors
    /// Any [`ElfError`] header variant describing the first failed check.
    pub fn parse(bytes: &[u8; Self::SIZE]) -> Result<Self, ElfError> {
        // SAFETY: The buffer has exactly the size of the header; all fields are plain integers.
        let ehdr = unsafe { read_unaligned(bytes.as_ptr().cast::<Elf32Ehdr>()) };

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&ehdr.e_ident[0..4]);
        if magic != Self::MAGIC {
            return Err(ElfError::BadMagic { found: magic });
        }

        let (class, data) = (ehdr.e_ident[4], ehdr.e_ident[5]);
        if class != ELFCLASS32 {
            return Err(ElfError::UnsupportedClass(class));
        }
        if data != ELFDATA2LSB {
            return Err(ElfError::UnsupportedEncoding(data));
        }
        if ehdr.e_version != EV_CURRENT || u32::from(ehdr.e_ident[6]) != EV_CURRENT {
            return Err(ElfError::UnsupportedVersion(ehdr.e_version));
        }
        if ehdr.e_type != ET_EXEC {
            return Err(ElfError::NotExecutable(ehdr.e_type));
        }
        if usize::from(ehdr.e_phentsize) != crate::segment::PHDR_SIZE {
            return Err(ElfError::EntrySize {
                expected: crate::segment::PHDR_SIZE,
                found: ehdr.e_phentsize,
            });
        }

        Ok(Self {
            magic,
            class,
            data,
            version: ehdr.e_version,
            object_type: ehdr.e_type,
            machine: ehdr.e_machine,
            entry: VirtualAddress::from(ehdr.e_entry),
            phoff: u64::from(ehdr.e_phoff),
            phentsize: ehdr.e_phentsize,
            phnum: ehdr.e_phnum,
        })
    }

    /// Byte size of the whole program header table.
    #[must_use]
    pub const fn segment_table_size(&self) -> u64 {
        self.phentsize as u64 * self.phnum as u64
    }
}
