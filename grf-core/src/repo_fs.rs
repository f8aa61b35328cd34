//! Single-file archive backend.
//!
//! Layout: `[superblock | payloads… | CBOR entry table]`. New payloads are
//! appended at the end of the file, past the table the superblock currently
//! points at, so the on-disk archive stays readable until the next `save()`
//! writes a fresh table and repoints the superblock.

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use time::OffsetDateTime;
use tracing::debug;

use crate::batch::progress::{BatchStatus, UnitCallback};
use crate::codec::{self, CodecId};
use crate::container::manifest::{Manifest, Meta, TableEntry};
use crate::container::superblock::{HEADER_LEN, Superblock};
use crate::domain::{ArchiveEntry, EntryId, RepackPolicy, StorageFlags, StoredBlob};
use crate::error::{GrfError, Result};
use crate::repo::{GrfArchive, OpenParams};

const TOOL: &str = "grf-core/fs";

pub struct FsArchive {
    path: PathBuf,
    file: File,
    writable: bool,
    level: u32,
    sb: Superblock,
    entries: BTreeMap<EntryId, TableEntry>,
    by_path: HashMap<Vec<u8>, EntryId>,
    next_id: u32,
    file_end: u64,
    created: i64,
    dirty: bool,
}

impl FsArchive {
    /// Create (or truncate) an empty archive at `params.archive_path`.
    pub fn create(params: &OpenParams) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&params.archive_path)?;
        Superblock::empty().write_to(&mut file)?;
        let mut arc = Self {
            path: params.archive_path.clone(),
            file,
            writable: true,
            level: params.compression_level.min(9),
            sb: Superblock::empty(),
            entries: BTreeMap::new(),
            by_path: HashMap::new(),
            next_id: 1,
            file_end: HEADER_LEN,
            created: now(),
            dirty: true,
        };
        // An empty table makes the fresh file loadable right away.
        arc.save()?;
        arc.writable = params.writable;
        debug!(path = %arc.path.display(), "created archive");
        Ok(arc)
    }

    /// Load an existing archive. Anything that fails validation is a `Format` error.
    pub fn open(params: &OpenParams) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(params.writable)
            .open(&params.archive_path)?;
        let file_len = file.metadata()?.len();

        let sb = Superblock::read_from(&mut file).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
                GrfError::Format(format!("{}: {e}", params.archive_path.display()))
            }
            _ => GrfError::Io(e),
        })?;
        let table_end = sb.table_off.checked_add(sb.table_len);
        if sb.table_off < HEADER_LEN || table_end.is_none_or(|end| end > file_len) {
            return Err(GrfError::Format(format!(
                "entry table out of bounds: off={} len={} file={file_len}",
                sb.table_off, sb.table_len
            )));
        }

        file.seek(SeekFrom::Start(sb.table_off))?;
        let mut tbytes = vec![0u8; sb.table_len as usize];
        file.read_exact(&mut tbytes)?;
        let manifest: Manifest = ciborium::de::from_reader(&tbytes[..])
            .map_err(|e| GrfError::Format(format!("entry table decode: {e}")))?;

        let mut entries = BTreeMap::new();
        let mut by_path = HashMap::new();
        let mut next_id = 1u32;
        for te in manifest.entries {
            let end = te.storage_offset.checked_add(te.storage_size);
            if te.storage_offset < HEADER_LEN || end.is_none_or(|end| end > file_len) {
                return Err(GrfError::Format(format!("entry {} out of bounds", te.id)));
            }
            if te.codec == CodecId::Store && te.size != te.storage_size {
                return Err(GrfError::Format(format!(
                    "entry {} stores {} bytes but claims {}",
                    te.id, te.storage_size, te.size
                )));
            }
            if te.id.0 == u32::MAX {
                return Err(GrfError::Format(format!("entry id {} out of range", te.id)));
            }
            if by_path.insert(te.path.clone(), te.id).is_some() {
                return Err(GrfError::Format(format!("duplicate path for entry {}", te.id)));
            }
            next_id = next_id.max(te.id.0 + 1);
            if entries.insert(te.id, te).is_some() {
                return Err(GrfError::Format("duplicate entry id".into()));
            }
        }

        debug!(
            path = %params.archive_path.display(),
            entries = entries.len(),
            "opened archive"
        );
        Ok(Self {
            path: params.archive_path.clone(),
            file,
            writable: params.writable,
            level: params.compression_level.min(9),
            sb,
            entries,
            by_path,
            next_id,
            file_end: file_len,
            created: manifest.meta.created,
            dirty: false,
        })
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(GrfError::ReadOnly)
        }
    }

    fn append_payload(&mut self, data: &[u8]) -> Result<u64> {
        let off = self.file_end;
        self.file.seek(SeekFrom::Start(off))?;
        self.file.write_all(data)?;
        self.file_end += data.len() as u64;
        Ok(off)
    }

    fn insert(&mut self, path: &[u8], blob: StoredBlob) -> Result<EntryId> {
        self.ensure_writable()?;
        if blob.codec == CodecId::Store && blob.size != blob.data.len() as u64 {
            return Err(GrfError::Format(format!(
                "stored payload of {} bytes claims {}",
                blob.data.len(),
                blob.size
            )));
        }
        // u32::MAX is never handed out, so `next_id + 1` cannot overflow.
        if self.next_id == u32::MAX {
            return Err(GrfError::Format("entry ids exhausted".into()));
        }
        let id = EntryId(self.next_id);
        let storage_offset = self.append_payload(&blob.data)?;
        if let Some(old) = self.by_path.remove(path) {
            self.entries.remove(&old);
        }
        self.next_id += 1;
        self.entries.insert(
            id,
            TableEntry {
                id,
                path: path.to_vec(),
                size: blob.size,
                storage_size: blob.data.len() as u64,
                storage_offset,
                flags: blob.flags,
                codec: blob.codec,
            },
        );
        self.by_path.insert(path.to_vec(), id);
        self.dirty = true;
        Ok(id)
    }

    fn read_payload(&self, te: &TableEntry) -> Result<Vec<u8>> {
        let mut f = &self.file;
        f.seek(SeekFrom::Start(te.storage_offset))?;
        let mut buf = vec![0u8; te.storage_size as usize];
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn table_entry(&self, id: EntryId) -> Result<&TableEntry> {
        self.entries.get(&id).ok_or(GrfError::NotFound(id))
    }

    fn encode_table(&self, entries: &BTreeMap<EntryId, TableEntry>) -> Result<Vec<u8>> {
        let manifest = Manifest {
            entries: entries.values().cloned().collect(),
            meta: Meta {
                created: self.created,
                saved: now(),
                tool: TOOL.to_string(),
            },
        };
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&manifest, &mut buf)
            .map_err(|e| GrfError::Format(format!("entry table encode: {e}")))?;
        Ok(buf)
    }

    /// Apply `policy` to one stored payload.
    fn transform(&self, blob: StoredBlob, policy: RepackPolicy) -> Result<StoredBlob> {
        match policy {
            RepackPolicy::MoveOnly => Ok(blob),
            RepackPolicy::Decrypt => Ok(StoredBlob {
                flags: blob.flags.without(StorageFlags::DES | StorageFlags::MIXCRYPT),
                ..blob
            }),
            RepackPolicy::Recompress => {
                let mut plain = Vec::new();
                codec::decode_payload(blob.codec, &blob.data, &mut plain)?;
                let (codec, data) = codec::encode_payload(&plain, self.level)?;
                Ok(StoredBlob {
                    data,
                    size: plain.len() as u64,
                    codec,
                    flags: blob.flags,
                })
            }
        }
    }
}

impl GrfArchive for FsArchive {
    fn entries(&self) -> Vec<ArchiveEntry> {
        self.entries.values().map(TableEntry::to_entry).collect()
    }

    fn entry(&self, id: EntryId) -> Option<ArchiveEntry> {
        self.entries.get(&id).map(TableEntry::to_entry)
    }

    fn file_count(&self) -> u64 {
        self.entries.len() as u64
    }

    fn wasted_space(&self) -> u64 {
        let live: u64 = self.entries.values().map(|e| e.storage_size).sum();
        self.file_end
            .saturating_sub(HEADER_LEN)
            .saturating_sub(live)
            .saturating_sub(self.sb.table_len)
    }

    fn storage_len(&self) -> u64 {
        self.file_end
    }

    fn set_compression_level(&mut self, level: u32) {
        self.level = level.min(9);
    }

    fn add_entry(&mut self, virtual_path: &[u8], src: &mut dyn Read) -> Result<EntryId> {
        self.ensure_writable()?;
        let mut plain = Vec::new();
        src.read_to_end(&mut plain)?;
        let (codec, data) = codec::encode_payload(&plain, self.level)?;
        self.insert(
            virtual_path,
            StoredBlob {
                data,
                size: plain.len() as u64,
                codec,
                flags: StorageFlags::FILE,
            },
        )
    }

    fn add_stored(&mut self, virtual_path: &[u8], blob: StoredBlob) -> Result<EntryId> {
        self.insert(virtual_path, blob)
    }

    fn read_entry(&self, id: EntryId, out: &mut dyn Write) -> Result<u64> {
        let te = self.table_entry(id)?;
        let stored = self.read_payload(te)?;
        codec::decode_payload(te.codec, &stored, out)
    }

    fn read_stored(&self, id: EntryId) -> Result<StoredBlob> {
        let te = self.table_entry(id)?;
        Ok(StoredBlob {
            data: self.read_payload(te)?,
            size: te.size,
            codec: te.codec,
            flags: te.flags,
        })
    }

    fn delete_entry(&mut self, id: EntryId) -> Result<bool> {
        self.ensure_writable()?;
        match self.entries.remove(&id) {
            Some(te) => {
                self.by_path.remove(&te.path);
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn save(&mut self) -> Result<()> {
        self.ensure_writable()?;
        if !self.dirty {
            return Ok(());
        }
        let table = self.encode_table(&self.entries)?;
        let table_off = self.append_payload(&table)?;
        self.file.set_len(self.file_end)?;
        self.sb = Superblock {
            table_off,
            table_len: table.len() as u64,
            ..self.sb
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.sb.write_to(&mut self.file)?;
        self.file.sync_data()?;
        self.dirty = false;
        debug!(entries = self.entries.len(), table_off, "saved archive");
        Ok(())
    }

    fn repack(
        &mut self,
        policy: RepackPolicy,
        progress: &mut UnitCallback<'_>,
    ) -> Result<BatchStatus> {
        self.ensure_writable()?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        Superblock::empty().write_to(tmp.as_file_mut())?;

        let total = self.entries.len() as u64;
        let mut pos = HEADER_LEN;
        let mut status = BatchStatus::Completed;
        let mut rewritten = BTreeMap::new();
        for (i, te) in self.entries.values().enumerate() {
            let mut blob = StoredBlob {
                data: self.read_payload(te)?,
                size: te.size,
                codec: te.codec,
                flags: te.flags,
            };
            // Past a cancellation the rest is carried over untouched.
            if status == BatchStatus::Completed {
                blob = self.transform(blob, policy)?;
            }
            tmp.as_file_mut().write_all(&blob.data)?;
            rewritten.insert(
                te.id,
                TableEntry {
                    storage_offset: pos,
                    storage_size: blob.data.len() as u64,
                    size: blob.size,
                    codec: blob.codec,
                    flags: blob.flags,
                    ..te.clone()
                },
            );
            pos += blob.data.len() as u64;
            if status == BatchStatus::Completed && !progress(i as u64 + 1, total, &te.path) {
                status = BatchStatus::Cancelled;
            }
        }

        let table = self.encode_table(&rewritten)?;
        tmp.as_file_mut().write_all(&table)?;
        let sb = Superblock {
            table_off: pos,
            table_len: table.len() as u64,
            ..Superblock::empty()
        };
        tmp.as_file_mut().seek(SeekFrom::Start(0))?;
        sb.write_to(tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        if let Ok(md) = std::fs::metadata(&self.path) {
            std::fs::set_permissions(tmp.path(), md.permissions())?;
        }

        // Nothing on the handle changes until the rewrite is in place.
        let file = tmp.persist(&self.path).map_err(|e| GrfError::Io(e.error))?;
        self.entries = rewritten;
        self.file = file;
        self.sb = sb;
        self.file_end = pos + table.len() as u64;
        self.dirty = false;
        debug!(?policy, ?status, file_end = self.file_end, "repacked archive");
        Ok(status)
    }
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
