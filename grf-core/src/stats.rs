use serde::{Deserialize, Serialize};

use crate::repo::GrfArchive;
use crate::tree::VirtualTree;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub files: u64,
    pub dirs: u64,
    pub logical_bytes: u64,
    pub stored_bytes: u64,
    pub wasted_bytes: u64,
    pub encrypted_files: u64,
    pub storage_len: u64,
    /// Share of the storage a repack would give back, 0..=100.
    pub reclaimable_pct: f32,
}

impl ArchiveStats {
    pub fn collect(archive: &dyn GrfArchive, tree: &VirtualTree) -> Self {
        let mut s = ArchiveStats {
            files: archive.file_count(),
            dirs: tree.dir_count() as u64,
            wasted_bytes: archive.wasted_space(),
            storage_len: archive.storage_len(),
            ..Default::default()
        };
        for e in archive.entries() {
            s.logical_bytes += e.size;
            s.stored_bytes += e.storage_size;
            if e.flags.is_encrypted() {
                s.encrypted_files += 1;
            }
        }
        if s.storage_len > 0 {
            s.reclaimable_pct = (s.wasted_bytes as f64 * 100.0 / s.storage_len as f64) as f32;
        }
        s
    }
}
