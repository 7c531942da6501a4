use crate::{Errno, Protection};
use loader_addresses::{Size4K, VirtualAddress, VirtualPage, VirtualRange};

/// Failures of the host paging and trap primitives.
///
/// All variants are `Copy` and display without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("Failed to reserve {range}: {errno}")]
    Reserve { range: VirtualRange, errno: Errno },
    #[error("Address range {range} is already mapped in this process")]
    AddressConflict { range: VirtualRange },
    #[error("Failed to map page {page}: {errno}")]
    Map {
        page: VirtualPage<Size4K>,
        errno: Errno,
    },
    #[error("Failed to set protection {protection} on page {page}: {errno}")]
    Protect {
        page: VirtualPage<Size4K>,
        protection: Protection,
        errno: Errno,
    },
    #[error("Failed to release {range}: {errno}")]
    Release { range: VirtualRange, errno: Errno },
    #[error("Address {0} is not representable on this host")]
    Unrepresentable(VirtualAddress),
    #[error("Host page size is {0} bytes, only 4096 is supported")]
    PageSize(u64),
    #[error("Failed to install the SIGSEGV handler: {0}")]
    Signal(Errno),
    #[error("A fault trap is already armed")]
    TrapBusy,
}
