use loader_addresses::{Size4K, VirtualAddress, VirtualPage};
use loader_elf::ElfError;
use loader_host::{Errno, HostError, Protection};

/// Unresolvable page faults.
///
/// Raised inside the fault trap, so every variant is `Copy` and formats
/// without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FaultError {
    #[error("Address {0} lies outside every loadable segment")]
    SegmentNotFound(VirtualAddress),
    #[error("Access to {address} violates the {protection} protection of resident page {page}")]
    ProtectionViolation {
        address: VirtualAddress,
        page: VirtualPage<Size4K>,
        protection: Protection,
    },
    #[error("Failed to map a page: {0}")]
    Mapping(HostError),
    #[error("Failed to read {len} bytes at file offset {offset:#x} for page {page}: {errno}")]
    ContentRead {
        page: VirtualPage<Size4K>,
        offset: u64,
        len: u64,
        errno: Errno,
    },
    #[error("Failed to apply page permissions: {0}")]
    Permission(HostError),
}

impl FaultError {
    /// Process exit status for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::SegmentNotFound(_) => 10,
            Self::Mapping(_) => 11,
            Self::ContentRead { .. } => 12,
            Self::Permission(_) => 13,
            Self::ProtectionViolation { .. } => 14,
        }
    }
}

/// Failures before or around running the target program.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Invalid command line")]
    Usage(#[source] clap::Error),
    #[error("Cannot open the executable")]
    Open(#[source] ElfError),
    #[error("Invalid executable")]
    Format(#[source] ElfError),
    #[error("Entry point {0} is not inside a loadable, executable segment")]
    MissingEntryPoint(VirtualAddress),
    #[error(
        "Executable is built for machine {found}, this host runs {}",
        .expected.map_or_else(|| "an unsupported architecture".to_owned(), |m| m.to_string())
    )]
    MachineMismatch { found: u16, expected: Option<u16> },
    #[error("Host setup failed")]
    Host(#[from] HostError),
}

impl LoaderError {
    /// Process exit status for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Open(_) => 3,
            Self::Format(_) => 4,
            Self::MissingEntryPoint(_) => 5,
            Self::MachineMismatch { .. } => 6,
            Self::Host(_) => 7,
        }
    }
}

impl From<ElfError> for LoaderError {
    fn from(value: ElfError) -> Self {
        match value {
            ElfError::Open { .. } => Self::Open(value),
            other => Self::Format(other),
        }
    }
}
