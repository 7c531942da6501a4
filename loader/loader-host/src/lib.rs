//! # Host Paging and Fault Trap
//!
//! The operating-system surface of the demand-paged loader:
//!
//! * [`PageHost`] / [`LibcHost`]: reserve address ranges, map zero pages,
//!   change their protection and release them again;
//! * [`with_fault_trap`]: route `SIGSEGV` to a [`FaultHandler`] while a
//!   closure runs;
//! * [`trap_trace!`]: formatted, allocation-free output to standard error
//!   for use inside the trap.
//!
//! Everything reachable from the trap is `Copy` data, atomics, or raw
//! system calls.

mod errno;
mod error;
mod page_host;
mod protection;
pub mod trace;
mod trap;

pub use errno::Errno;
pub use error::HostError;
pub use page_host::{LibcHost, PageHost, host_page_size};
pub use protection::Protection;
pub use trace::exit_immediately;
pub use trap::{FaultCause, FaultHandler, FaultInfo, with_fault_trap};
