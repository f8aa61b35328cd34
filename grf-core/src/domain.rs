// grf_core/src/domain.rs
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::CodecId;

/// Archive-assigned entry handle. Stable until the entry is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u32);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Storage flags as carried by GRF entries. Only `FILE` is set by this crate;
/// the cipher markers travel with entries merged from other archives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageFlags(pub u32);

impl StorageFlags {
    pub const FILE: StorageFlags = StorageFlags(0x01);
    pub const MIXCRYPT: StorageFlags = StorageFlags(0x02);
    pub const DES: StorageFlags = StorageFlags(0x04);

    pub fn contains(self, other: StorageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn without(self, other: StorageFlags) -> StorageFlags {
        StorageFlags(self.0 & !other.0)
    }

    pub fn is_encrypted(self) -> bool {
        self.cipher().is_some()
    }

    /// MIXCRYPT wins over DES when both bits are present.
    pub fn cipher(self) -> Option<Cipher> {
        if self.contains(Self::MIXCRYPT) {
            Some(Cipher::MixCrypt)
        } else if self.contains(Self::DES) {
            Some(Cipher::Des)
        } else {
            None
        }
    }
}

impl std::ops::BitOr for StorageFlags {
    type Output = StorageFlags;
    fn bitor(self, rhs: StorageFlags) -> StorageFlags {
        StorageFlags(self.0 | rhs.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cipher {
    Des,
    MixCrypt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub id: EntryId,
    /// Backslash-delimited, in the archive's native encoding.
    pub virtual_path: Vec<u8>,
    pub size: u64,
    pub storage_size: u64,
    pub storage_offset: u64,
    pub flags: StorageFlags,
}

impl ArchiveEntry {
    /// Last path segment, raw.
    pub fn basename(&self) -> &[u8] {
        match self.virtual_path.iter().rposition(|&b| b == b'\\') {
            Some(i) => &self.virtual_path[i + 1..],
            None => &self.virtual_path,
        }
    }
}

/// Entry payload exactly as stored, used to move entries between archives.
#[derive(Clone, Debug)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub size: u64,
    pub codec: CodecId,
    pub flags: StorageFlags,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepackPolicy {
    /// Relocate stored bytes only.
    #[default]
    MoveOnly,
    /// Drop cipher markers while relocating.
    Decrypt,
    /// Decode and re-encode every payload at the current compression level.
    Recompress,
}

impl RepackPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RepackPolicy::MoveOnly => "move-only",
            RepackPolicy::Decrypt => "decrypt",
            RepackPolicy::Recompress => "recompress",
        }
    }
}

impl fmt::Display for RepackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RepackPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "move-only" | "move" | "fast" => Ok(RepackPolicy::MoveOnly),
            "decrypt" => Ok(RepackPolicy::Decrypt),
            "recompress" => Ok(RepackPolicy::Recompress),
            other => Err(format!("unknown repack policy: {other}")),
        }
    }
}
