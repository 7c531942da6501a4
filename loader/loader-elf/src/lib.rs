//! # ELF32 Executable Metadata
//!
//! Reads what the demand-paged loader needs to know about a statically linked
//! 32-bit ELF executable, and nothing more:
//!
//! * the file header ([`ElfHeader`]): magic, class, encoding, type, machine,
//!   entry point and the location of the program header table;
//! * the program header table ([`SegmentTable`]) with one [`Segment`] per
//!   entry, of which only `PT_LOAD` entries take part in paging;
//! * positional reads of segment contents ([`ElfFile::read_exact_at`]) for the
//!   fault handler.
//!
//! ```no_run
//! # use loader_elf::ElfFile;
//! # use loader_addresses::VirtualAddress;
//! let mut file = ElfFile::open("a.out")?;
//! let header = file.read_header()?;
//! let segments = file.read_segments(&header)?;
//! let owner = segments.find_segment(VirtualAddress::new(0x0804_9000));
//! # Ok::<(), loader_elf::ElfError>(())
//! ```

#[cfg(any(test, feature = "builder"))]
pub mod builder;
mod error;
mod header;
mod reader;
mod segment;
mod table;

pub use error::ElfError;
pub use header::{
    ELFCLASS32, ELFDATA2LSB, EM_386, EM_AARCH64, EM_X86_64, ET_EXEC, ElfHeader, HOST_MACHINE,
};
pub use reader::ElfFile;
pub use segment::{PFlags, PHDR_SIZE, PT_LOAD, Segment, SegmentKind};
pub use table::SegmentTable;
