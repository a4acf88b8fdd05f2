use std::{
    fmt::{self, Display},
    ops::{BitAnd, BitOr, BitOrAssign},
};

/// Converter selection strategies, combinable with `|`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetectTypes(u8);

/// Raw values are returned as produced by the engine.
pub const PARSE_NONE: DetectTypes = DetectTypes(0);
/// Select the converter by the declared type of the column.
pub const PARSE_DECLTYPES: DetectTypes = DetectTypes(1);
/// Select the converter by the `name [type]` annotation of the column name.
pub const PARSE_COLNAMES: DetectTypes = DetectTypes(2);

impl DetectTypes {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b11)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: DetectTypes) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for DetectTypes {
    type Output = DetectTypes;
    fn bitor(self, rhs: Self) -> Self::Output {
        DetectTypes(self.0 | rhs.0)
    }
}

impl BitOrAssign for DetectTypes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for DetectTypes {
    type Output = DetectTypes;
    fn bitand(self, rhs: Self) -> Self::Output {
        DetectTypes(self.0 & rhs.0)
    }
}

/// How the native handle opens its target.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
    /// Read and write, create the database when missing.
    #[default]
    ReadWriteCreate,
    /// Private in-memory database, the target is only a name.
    Memory,
}

impl OpenMode {
    /// Parse the short form used in connection URLs (`ro`, `rw`, `rwc`, `memory`).
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "ro" => OpenMode::ReadOnly,
            "rw" => OpenMode::ReadWrite,
            "rwc" => OpenMode::ReadWriteCreate,
            "memory" => OpenMode::Memory,
            _ => return None,
        })
    }
}

impl Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpenMode::ReadOnly => "ro",
            OpenMode::ReadWrite => "rw",
            OpenMode::ReadWriteCreate => "rwc",
            OpenMode::Memory => "memory",
        })
    }
}
