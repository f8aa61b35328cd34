// grf_core/src/repo.rs
use std::io::{Read, Write};

use crate::batch::progress::{BatchStatus, UnitCallback};
use crate::domain::{ArchiveEntry, EntryId, RepackPolicy, StorageFlags, StoredBlob};
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct OpenParams {
    pub archive_path: std::path::PathBuf,
    pub writable: bool,
    /// 0 stores payloads uncompressed; 1..=9 selects the zstd level.
    pub compression_level: u32,
}

impl OpenParams {
    pub fn new(archive_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            archive_path: archive_path.into(),
            writable: true,
            compression_level: 5,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }
}

/// Archive primitives consumed by the tree builder and the batch orchestrator.
///
/// Implementations own their handle exclusively; callers serialize batch
/// operations through `&mut self`.
pub trait GrfArchive {
    /// Live entries, ascending by id.
    fn entries(&self) -> Vec<ArchiveEntry>;

    fn entry(&self, id: EntryId) -> Option<ArchiveEntry>;

    fn file_count(&self) -> u64;

    /// Bytes in the backing storage not referenced by any live entry.
    fn wasted_space(&self) -> u64;

    /// Total size of the backing storage.
    fn storage_len(&self) -> u64;

    fn set_compression_level(&mut self, level: u32);

    /// Adds (or replaces) the entry at `virtual_path`, reading its content from `src`.
    fn add_entry(&mut self, virtual_path: &[u8], src: &mut dyn Read) -> Result<EntryId>;

    /// Adds (or replaces) an entry from a payload that is already encoded.
    fn add_stored(&mut self, virtual_path: &[u8], blob: StoredBlob) -> Result<EntryId>;

    /// Writes the plain content of `id` into `out`; returns the byte count written.
    fn read_entry(&self, id: EntryId, out: &mut dyn Write) -> Result<u64>;

    fn read_stored(&self, id: EntryId) -> Result<StoredBlob>;

    /// Removes `id`. Deleting an id that is already gone is a no-op returning `false`.
    fn delete_entry(&mut self, id: EntryId) -> Result<bool>;

    /// Persists the entry table. Unsaved changes are invisible to the next open.
    fn save(&mut self) -> Result<()>;

    /// Rewrites the backing storage to reclaim wasted space. One unit per entry.
    fn repack(&mut self, policy: RepackPolicy, progress: &mut UnitCallback<'_>)
    -> Result<BatchStatus>;

    /// Folds every entry of `src` into `self`. One unit per source entry.
    ///
    /// An entry of `src` replaces an entry of `self` at the same virtual path,
    /// whatever the policy. The policy only decides how the payload is carried:
    /// verbatim (`MoveOnly`), with cipher markers dropped (`Decrypt`), or
    /// decoded and re-encoded at this archive's level (`Recompress`).
    fn merge(
        &mut self,
        src: &dyn GrfArchive,
        policy: RepackPolicy,
        progress: &mut UnitCallback<'_>,
    ) -> Result<BatchStatus> {
        let entries = src.entries();
        let total = entries.len() as u64;
        for (i, e) in entries.iter().enumerate() {
            match policy {
                RepackPolicy::Recompress => {
                    let mut plain = Vec::new();
                    src.read_entry(e.id, &mut plain)?;
                    self.add_entry(&e.virtual_path, &mut &plain[..])?;
                }
                RepackPolicy::MoveOnly | RepackPolicy::Decrypt => {
                    let mut blob = src.read_stored(e.id)?;
                    if policy == RepackPolicy::Decrypt {
                        blob.flags = blob.flags.without(StorageFlags::DES | StorageFlags::MIXCRYPT);
                    }
                    self.add_stored(&e.virtual_path, blob)?;
                }
            }
            if !progress(i as u64 + 1, total, &e.virtual_path) {
                return Ok(BatchStatus::Cancelled);
            }
        }
        Ok(BatchStatus::Completed)
    }
}
