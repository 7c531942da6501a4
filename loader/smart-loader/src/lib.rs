//! # smart-loader
//!
//! Runs a statically linked 32-bit ELF executable inside the current process
//! without loading it up front. Every page a loadable segment spans is
//! reserved inaccessible; the first access to a page raises `SIGSEGV`, and
//! the [`DemandPager`] maps exactly that page, fills it from the file, and
//! applies the segment's permissions before the access is retried.
//!
//! After the program's entry function returns, [`run`] reports the number of
//! faults, pages allocated, and the internal fragmentation of those pages.
//!
//! ```no_run
//! use smart_loader::{Options, run};
//!
//! let outcome = run(&Options::new("sum"))?;
//! print!("{outcome}");
//! # Ok::<(), smart_loader::LoaderError>(())
//! ```

mod cli;
mod context;
mod coverage;
mod error;
mod journal;
mod logger;
mod pager;
mod resident;
mod run;
mod stats;

pub use cli::Options;
pub use context::LoaderContext;
pub use coverage::PageCoverage;
pub use error::{FaultError, LoaderError};
pub use journal::FaultJournal;
pub use logger::StderrLogger;
pub use pager::{DemandPager, PageFill, protection_for};
pub use resident::ResidentPages;
pub use run::{RunOutcome, run};
pub use stats::{ExecutionStats, StatsReport};
