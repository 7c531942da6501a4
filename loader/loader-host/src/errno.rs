use core::fmt;

/// Raw OS error number.
///
/// Unlike [`std::io::Error`] it is `Copy` and formats without allocating, so
/// it can travel through the fault trap.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    /// The calling thread's current `errno`.
    #[must_use]
    pub fn last() -> Self {
        // SAFETY: `__errno_location` always returns a valid thread-local pointer.
        Self(unsafe { *libc::__errno_location() })
    }

    /// Symbolic name for the errors the loader is likely to meet.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            libc::EPERM => "EPERM",
            libc::EINTR => "EINTR",
            libc::EIO => "EIO",
            libc::EBADF => "EBADF",
            libc::EAGAIN => "EAGAIN",
            libc::ENOMEM => "ENOMEM",
            libc::EACCES => "EACCES",
            libc::EFAULT => "EFAULT",
            libc::EEXIST => "EEXIST",
            libc::EINVAL => "EINVAL",
            libc::ENFILE => "ENFILE",
            libc::EMFILE => "EMFILE",
            libc::EOVERFLOW => "EOVERFLOW",
            _ => return None,
        })
    }
}

impl From<&std::io::Error> for Errno {
    fn from(err: &std::io::Error) -> Self {
        Self(err.raw_os_error().unwrap_or(libc::EIO))
    }
}

impl fmt::Debug for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Errno({self})")
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (os error {})", self.0),
            None => write!(f, "os error {}", self.0),
        }
    }
}
