//! Ways control can leave a block

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set of block exits
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExitFlags(u8);

impl ExitFlags {
    pub const RETURN: ExitFlags = ExitFlags(1);
    pub const BREAK: ExitFlags = ExitFlags(1 << 1);
    pub const CONTINUE: ExitFlags = ExitFlags(1 << 2);
    pub const THROW: ExitFlags = ExitFlags(1 << 3);
    pub const DIE: ExitFlags = ExitFlags(1 << 4);

    /// Exits that only leave the innermost loop or switch
    pub const LOOP_LOCAL: ExitFlags = ExitFlags(Self::BREAK.0 | Self::CONTINUE.0);

    pub const fn empty() -> Self {
        ExitFlags(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Every bit of `other` is set
    pub const fn contains(self, other: ExitFlags) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: ExitFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: ExitFlags) {
        self.0 |= other.0;
    }

    /// Bits of `self` also in `mask`
    pub const fn intersection(self, mask: ExitFlags) -> ExitFlags {
        ExitFlags(self.0 & mask.0)
    }

    /// Bits of `self` not in `mask`
    pub const fn without(self, mask: ExitFlags) -> ExitFlags {
        ExitFlags(self.0 & !mask.0)
    }
}

impl BitOr for ExitFlags {
    type Output = ExitFlags;

    fn bitor(self, rhs: ExitFlags) -> ExitFlags {
        ExitFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ExitFlags {
    fn bitor_assign(&mut self, rhs: ExitFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ExitFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (ExitFlags::RETURN, "return"),
            (ExitFlags::BREAK, "break"),
            (ExitFlags::CONTINUE, "continue"),
            (ExitFlags::THROW, "throw"),
            (ExitFlags::DIE, "die"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "ExitFlags({})", set.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_operations() {
        let mut flags = ExitFlags::empty();
        assert!(flags.is_empty());
        flags.insert(ExitFlags::RETURN);
        flags |= ExitFlags::BREAK;
        assert!(flags.contains(ExitFlags::RETURN));
        assert!(!flags.contains(ExitFlags::THROW));
        assert_eq!(flags.without(ExitFlags::LOOP_LOCAL), ExitFlags::RETURN);
        assert_eq!(format!("{:?}", flags), "ExitFlags(return|break)");
    }

    #[test]
    fn test_empty_is_not_contained() {
        assert!(!ExitFlags::RETURN.contains(ExitFlags::empty()));
    }
}
