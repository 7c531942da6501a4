use bitfield_struct::bitfield;
use core::fmt;

/// Access rights of a mapped page.
#[bitfield(u8)]
#[derive(PartialEq, Eq, Hash)]
pub struct Protection {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    #[bits(5)]
    __: u8,
}

impl Protection {
    /// No access at all; used for reservations.
    #[must_use]
    pub const fn none() -> Self {
        Self::new()
    }

    /// Read, write and execute. The state of a page while it is being filled.
    #[must_use]
    pub const fn all() -> Self {
        Self::new().with_read(true).with_write(true).with_execute(true)
    }

    /// Rights granted by either side.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.into_bits() | other.into_bits())
    }

    /// `PROT_*` bits for `mmap(2)`/`mprotect(2)`.
    #[must_use]
    pub const fn to_prot(self) -> libc::c_int {
        let mut prot = libc::PROT_NONE;
        if self.read() {
            prot |= libc::PROT_READ;
        }
        if self.write() {
            prot |= libc::PROT_WRITE;
        }
        if self.execute() {
            prot |= libc::PROT_EXEC;
        }
        prot
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(self.read(), 'r'),
            flag(self.write(), 'w'),
            flag(self.execute(), 'x')
        )
    }
}
