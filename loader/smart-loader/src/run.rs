//! # Loader Orchestrator

use crate::{LoaderContext, LoaderError, Options, StatsReport};
use core::fmt;
use loader_host::LibcHost;
use log::info;

/// Result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub stats: StatsReport,
    /// What the target's entry function returned.
    pub return_value: i32,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stats)?;
        writeln!(f, "Program's Output: {}", self.return_value)
    }
}

/// Load `options.executable`, run it to completion with demand paging, and
/// collect the paging statistics.
///
/// # Errors
/// Any [`LoaderError`] raised before the program starts. Faults the pager
/// cannot resolve terminate the process from inside the trap.
pub fn run(options: &Options) -> Result<RunOutcome, LoaderError> {
    let host = LibcHost::new()?;
    let context = LoaderContext::open(&options.executable, host, options.journal_capacity)?;
    context.check_machine()?;

    // SAFETY: Executing the user-supplied program is the purpose of this tool.
    let return_value = unsafe { context.execute() }?;

    let pager = context.pager();
    pager.journal().log();
    let stats = pager.stats().snapshot();
    info!(
        "{} of {} pages resident",
        pager.resident().resident_count(),
        pager.resident().len()
    );

    Ok(RunOutcome {
        stats,
        return_value,
    })
}
