use std::io;
use std::path::PathBuf;

/// Failures while reading and validating an ELF32 image.
#[derive(Debug, thiserror::Error)]
pub enum ElfError {
    #[error("Failed to open ELF file {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read ELF header")]
    HeaderRead(#[source] io::Error),
    #[error("Invalid ELF file: bad magic {found:02X?}")]
    BadMagic { found: [u8; 4] },
    #[error("Unsupported ELF class {0} (expected ELFCLASS32)")]
    UnsupportedClass(u8),
    #[error("Unsupported ELF data encoding {0} (expected little-endian)")]
    UnsupportedEncoding(u8),
    #[error("Unsupported ELF version {0}")]
    UnsupportedVersion(u32),
    #[error("ELF object type {0} is not a static executable")]
    NotExecutable(u16),
    #[error("Program header entry size is {found} bytes, expected {expected}")]
    EntrySize { expected: usize, found: u16 },
    #[error("Failed to read program headers")]
    SegmentTableRead(#[source] io::Error),
    #[error("Program header table at {offset:#x} ({size} bytes) exceeds the file ({file_len} bytes)")]
    SegmentTableOutOfBounds { offset: u64, size: u64, file_len: u64 },
    #[error("Segment {index} file content ends at {end:#x}, past the end of the file ({file_len} bytes)")]
    SegmentOutOfBounds { index: usize, end: u64, file_len: u64 },
    #[error("Segment {index} extends past the 32-bit address space")]
    AddressOverflow { index: usize },
}
