//! # Signal-safe diagnostics
//!
//! The fault trap must not allocate, lock, or touch buffered standard streams.
//! [`trap_trace!`](crate::trap_trace) formats straight into `write(2)` on
//! standard error instead.

use core::fmt::{self, Write};

/// Unbuffered sink for standard error.
pub struct StderrSink;

impl Write for StderrSink {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            // SAFETY: The pointer and length describe a live byte slice.
            let n = unsafe { libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len()) };
            match usize::try_from(n) {
                Ok(0) | Err(_) => {
                    if n < 0 && crate::Errno::last().0 == libc::EINTR {
                        continue;
                    }
                    return Err(fmt::Error);
                }
                Ok(written) => bytes = &bytes[written..],
            }
        }
        Ok(())
    }
}

#[doc(hidden)]
pub fn trap_write(args: fmt::Arguments) {
    // Ignore errors; there is nowhere left to report them.
    let _ = fmt::write(&mut StderrSink, args);
}

/// Leave the process right now, without unwinding or running exit handlers.
pub fn exit_immediately(status: i32) -> ! {
    // SAFETY: `_exit` is async-signal-safe and never returns.
    unsafe { libc::_exit(status) }
}

/// `eprint!` for signal context.
#[macro_export]
macro_rules! trap_trace {
    ($($arg:tt)*) => {{
        // No allocation: `format_args!` builds a lightweight `Arguments`.
        $crate::trace::trap_write(core::format_args!($($arg)*));
    }};
}
