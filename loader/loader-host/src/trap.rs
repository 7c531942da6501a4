//! # Fault Trap
//!
//! Routes `SIGSEGV` to a [`FaultHandler`] for the duration of a closure.
//!
//! The handler runs in signal context. It may map and fill pages and update
//! atomics, but must not allocate, lock, or use buffered I/O. When it returns
//! `Ok`, the faulting instruction is restarted. When it returns `Err`, the
//! error is written to standard error with [`trap_trace!`](crate::trap_trace)
//! and the process leaves immediately with [`FaultHandler::exit_status`].
//!
//! A fault that arrives while no handler is armed restores the default
//! disposition and returns, so the retried access terminates the process the
//! usual way.

use crate::{Errno, HostError, trace::exit_immediately, trap_trace};
use core::ffi::{c_int, c_void};
use core::fmt;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use loader_addresses::VirtualAddress;
use log::debug;

// `si_code` values for SIGSEGV from <asm-generic/siginfo.h>.
const SEGV_MAPERR: c_int = 1;
const SEGV_ACCERR: c_int = 2;

/// Why the access faulted, decoded from `si_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCause {
    /// `SEGV_MAPERR`: nothing is mapped at the address.
    Unmapped,
    /// `SEGV_ACCERR`: mapped, but the access is not permitted.
    AccessDenied,
    /// Anything else, e.g. a signal sent with `kill(2)`.
    Other(i32),
}

impl FaultCause {
    #[must_use]
    pub const fn from_si_code(code: i32) -> Self {
        match code {
            SEGV_MAPERR => Self::Unmapped,
            SEGV_ACCERR => Self::AccessDenied,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn explain(self) -> &'static str {
        match self {
            Self::Unmapped => "address not mapped",
            Self::AccessDenied => "access not permitted",
            Self::Other(_) => "not a memory access fault",
        }
    }
}

/// A trapped fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultInfo {
    pub address: VirtualAddress,
    pub cause: FaultCause,
}

impl FaultInfo {
    #[must_use]
    pub const fn new(address: VirtualAddress, cause: FaultCause) -> Self {
        Self { address, cause }
    }
}

/// Resolves faults trapped by [`with_fault_trap`].
pub trait FaultHandler {
    /// Reason a fault could not be resolved. Its `Display` must not allocate.
    type Error: fmt::Display;

    /// Make `fault.address` accessible so the faulting access can be retried.
    ///
    /// # Errors
    /// Any unresolvable fault; the process is terminated with it.
    fn handle_fault(&self, fault: &FaultInfo) -> Result<(), Self::Error>;

    /// Process exit status for an unresolvable fault.
    fn exit_status(&self, error: &Self::Error) -> i32;
}

/// Type-erased handler of the armed trap.
struct Registration {
    handler: *const (),
    dispatch: unsafe fn(*const (), &FaultInfo),
}

static ARMED: AtomicPtr<Registration> = AtomicPtr::new(ptr::null_mut());

/// Run `body` with `handler` receiving every `SIGSEGV` raised meanwhile.
///
/// Only one trap can be armed per process. The previous disposition of
/// `SIGSEGV` is restored when `body` returns or unwinds.
///
/// # Errors
/// [`HostError::TrapBusy`] if a trap is already armed,
/// [`HostError::Signal`] if the signal handler cannot be installed.
pub fn with_fault_trap<H, R>(handler: &H, body: impl FnOnce() -> R) -> Result<R, HostError>
where
    H: FaultHandler,
{
    let registration = Registration {
        handler: ptr::from_ref(handler).cast(),
        dispatch: dispatch::<H>,
    };

    ARMED
        .compare_exchange(
            ptr::null_mut(),
            ptr::from_ref(&registration).cast_mut(),
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .map_err(|_| HostError::TrapBusy)?;

    let previous = match install() {
        Ok(previous) => previous,
        Err(e) => {
            ARMED.store(ptr::null_mut(), Ordering::Release);
            return Err(e);
        }
    };

    let _armed = Armed { previous };
    debug!("Fault trap armed");
    Ok(body())
}

/// Disarms the trap on scope exit.
struct Armed {
    previous: libc::sigaction,
}

impl Drop for Armed {
    fn drop(&mut self) {
        // SAFETY: `previous` was filled in by a successful `sigaction` call.
        unsafe { libc::sigaction(libc::SIGSEGV, &raw const self.previous, ptr::null_mut()) };
        ARMED.store(ptr::null_mut(), Ordering::Release);
        debug!("Fault trap disarmed");
    }
}

fn install() -> Result<libc::sigaction, HostError> {
    let handler: extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void) = on_fault;

    // SAFETY: Zeroed `sigaction` structs are valid; every pointer handed to libc is live.
    unsafe {
        let mut action: libc::sigaction = core::mem::zeroed();
        action.sa_sigaction = handler as libc::sighandler_t;
        action.sa_flags = libc::SA_SIGINFO;
        libc::sigemptyset(&raw mut action.sa_mask);

        let mut previous: libc::sigaction = core::mem::zeroed();
        if libc::sigaction(libc::SIGSEGV, &raw const action, &raw mut previous) != 0 {
            return Err(HostError::Signal(Errno::last()));
        }
        Ok(previous)
    }
}

unsafe fn dispatch<H: FaultHandler>(handler: *const (), fault: &FaultInfo) {
    // SAFETY: `handler` was erased from an `&H` that outlives the armed trap.
    let handler = unsafe { &*handler.cast::<H>() };
    if let Err(error) = handler.handle_fault(fault) {
        trap_trace!("fatal fault at {}: {error}\n", fault.address);
        exit_immediately(handler.exit_status(&error));
    }
}

extern "C" fn on_fault(signal: c_int, info: *mut libc::siginfo_t, _context: *mut c_void) {
    // SAFETY: With SA_SIGINFO the kernel passes a valid `siginfo_t`.
    let (addr, code) = unsafe { ((*info).si_addr(), (*info).si_code) };
    let fault = FaultInfo::new(VirtualAddress::from_ptr(addr), FaultCause::from_si_code(code));

    let registration = ARMED.load(Ordering::Acquire);
    if registration.is_null() {
        trap_trace!(
            "unhandled signal {signal} at {} ({})\n",
            fault.address,
            fault.cause.explain()
        );
        // SAFETY: Resetting to the default disposition is async-signal-safe.
        unsafe { libc::signal(signal, libc::SIG_DFL) };
        return;
    }

    // SAFETY: A non-null slot points at the registration of the live `with_fault_trap` frame.
    unsafe {
        let registration = &*registration;
        (registration.dispatch)(registration.handler, &fault);
    }
}
