//! Reporting categories a counter can belong to.

use std::fmt;
use std::ops::{BitAnd, BitOr};

/// A set of report groups.
///
/// The low bits name report categories selectable by `stats <group>`. The
/// `RATE`, `MAX` and `MAX_MAX` bits say how a counter is rendered rather than
/// where it shows up. `SERVERS` and `SUSPECT_SERVERS` sit above `ALL` so that
/// `stats all` never triggers the per-destination walk.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Groups(u32);

impl Groups {
    pub const NONE: Groups = Groups(0);

    /// The default group, reported for `stats` with no argument.
    pub const MCPROXY: Groups = Groups(1 << 0);
    pub const DETAILED: Groups = Groups(1 << 1);
    pub const CMD_IN: Groups = Groups(1 << 2);
    pub const CMD_OUT: Groups = Groups(1 << 3);
    pub const CMD_ERROR: Groups = Groups(1 << 4);
    pub const ODS: Groups = Groups(1 << 5);
    pub const COUNT: Groups = Groups(1 << 6);
    pub const OUTLIER: Groups = Groups(1 << 7);

    /// Rendered as a windowed rate.
    pub const RATE: Groups = Groups(1 << 8);
    /// Rendered as the peak of per-bin sums across shards.
    pub const MAX: Groups = Groups(1 << 9);
    /// Rendered as the largest single-shard single-bin value.
    pub const MAX_MAX: Groups = Groups(1 << 10);

    pub const CMD_ALL: Groups = Groups(Self::CMD_IN.0 | Self::CMD_OUT.0 | Self::CMD_ERROR.0);
    pub const ALL: Groups = Groups(0xffff);

    pub const SERVERS: Groups = Groups(1 << 16);
    pub const SUSPECT_SERVERS: Groups = Groups(1 << 17);

    /// Counters with any of these bits are recorded into the bin store.
    pub const WINDOWED_KINDS: Groups = Groups(Self::RATE.0 | Self::MAX.0 | Self::MAX_MAX.0);

    pub const fn union(self, other: Groups) -> Groups {
        Groups(self.0 | other.0)
    }

    pub const fn intersects(self, other: Groups) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(self, other: Groups) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Groups {
    type Output = Groups;

    fn bitor(self, rhs: Groups) -> Groups {
        self.union(rhs)
    }
}

impl BitAnd for Groups {
    type Output = Groups;

    fn bitand(self, rhs: Groups) -> Groups {
        Groups(self.0 & rhs.0)
    }
}

impl fmt::Debug for Groups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Groups({:#x})", self.0)
    }
}
