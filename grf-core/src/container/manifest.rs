use serde::{Deserialize, Serialize};

use crate::codec::CodecId;
use crate::domain::{ArchiveEntry, EntryId, StorageFlags};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TableEntry {
    pub id: EntryId,
    /// Native-encoded virtual path
    pub path: Vec<u8>,
    pub size: u64,
    pub storage_size: u64,
    pub storage_offset: u64,
    pub flags: StorageFlags,
    pub codec: CodecId,
}

impl TableEntry {
    pub fn to_entry(&self) -> ArchiveEntry {
        ArchiveEntry {
            id: self.id,
            virtual_path: self.path.clone(),
            size: self.size,
            storage_size: self.storage_size,
            storage_offset: self.storage_offset,
            flags: self.flags,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Meta {
    pub created: i64,
    pub saved: i64,
    pub tool: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Manifest {
    pub entries: Vec<TableEntry>,
    pub meta: Meta,
}
