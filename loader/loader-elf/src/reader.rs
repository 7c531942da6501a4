//! # Binary Metadata Reader

use crate::{ElfError, ElfHeader, SegmentTable};
use log::{debug, trace, warn};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// An opened ELF32 executable.
///
/// The handle is kept open for the whole run: after the metadata has been
/// read it serves the segment content reads of the fault handler through
/// [`ElfFile::read_exact_at`].
#[derive(Debug)]
pub struct ElfFile {
    file: File,
    path: PathBuf,
    len: u64,
}

impl ElfFile {
    /// Open `path` read-only.
    ///
    /// # Errors
    /// [`ElfError::Open`] if the file cannot be opened or inspected.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ElfError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ElfError::Open {
            path: path.clone(),
            source,
        })?;
        let len = file
            .metadata()
            .map_err(|source| ElfError::Open {
                path: path.clone(),
                source,
            })?
            .len();

        debug!("Opened {} ({len} bytes)", path.display());
        Ok(Self { file, path, len })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size in bytes at the time it was opened.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read and validate the file header.
    ///
    /// # Errors
    /// [`ElfError::HeaderRead`] on a short or failed read, otherwise any
    /// validation error of [`ElfHeader::parse`].
    pub fn read_header(&mut self) -> Result<ElfHeader, ElfError> {
        let mut bytes = [0u8; ElfHeader::SIZE];
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_exact(&mut bytes))
            .map_err(ElfError::HeaderRead)?;

        let header = ElfHeader::parse(&bytes)?;
        trace!(
            "ELF header: entry={}, phoff={:#x}, phnum={}, machine={}",
            header.entry, header.phoff, header.phnum, header.machine
        );
        Ok(header)
    }

    /// Read the program header table described by `header` and validate it
    /// against the file.
    ///
    /// # Errors
    /// [`ElfError::SegmentTableOutOfBounds`] if the table does not fit the
    /// file, [`ElfError::SegmentTableRead`] on a short or failed read, and
    /// the errors of [`SegmentTable::validate`].
    pub fn read_segments(&mut self, header: &ElfHeader) -> Result<SegmentTable, ElfError> {
        let size = header.segment_table_size();
        let out_of_bounds = || ElfError::SegmentTableOutOfBounds {
            offset: header.phoff,
            size,
            file_len: self.len,
        };

        let end = header.phoff.checked_add(size).ok_or_else(out_of_bounds)?;
        if end > self.len {
            return Err(out_of_bounds());
        }

        let mut bytes = vec![0u8; usize::try_from(size).map_err(|_| out_of_bounds())?];
        self.file
            .seek(SeekFrom::Start(header.phoff))
            .and_then(|_| self.file.read_exact(&mut bytes))
            .map_err(ElfError::SegmentTableRead)?;

        let table = SegmentTable::parse(&bytes, usize::from(header.phnum));
        table.validate(self.len)?;

        for (index, seg) in table.iter().enumerate() {
            trace!(
                "Segment {index}: {:?} vaddr={} memsz={:#x} offset={:#x} filesz={:#x} flags={:#x}",
                seg.kind,
                seg.vaddr,
                seg.memsz,
                seg.offset,
                seg.filesz,
                seg.flags.into_bits()
            );
        }

        if let Some((a, b)) = table.first_overlap() {
            warn!("Loadable segments {a} and {b} overlap; faults resolve to segment {a}");
        }

        Ok(table)
    }

    /// Fill `buf` with the bytes at absolute file `offset`.
    ///
    /// Positional: the read does not depend on, nor move, any shared file
    /// position. Does not allocate.
    ///
    /// # Errors
    /// [`io::ErrorKind::UnexpectedEof`] on a short read, or the OS error.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        self.file.read_exact_at(buf, offset)
    }
}
