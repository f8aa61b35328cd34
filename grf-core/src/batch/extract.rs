use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::progress::{BatchReport, BatchStatus, Progress, ProgressSink};
use crate::domain::{ArchiveEntry, EntryId};
use crate::encoding::NativeCodec;
use crate::error::{GrfError, Result};
use crate::repo::GrfArchive;

/// How virtual paths become local file names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractNaming {
    /// Decode through the native codec.
    #[default]
    Unicode,
    /// Keep the archive bytes as the on-disk name.
    Native,
}

impl ExtractNaming {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractNaming::Unicode => "unicode",
            ExtractNaming::Native => "native",
        }
    }
}

impl fmt::Display for ExtractNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractNaming {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unicode" | "utf8" | "utf-8" => Ok(ExtractNaming::Unicode),
            "native" | "raw" => Ok(ExtractNaming::Native),
            other => Err(format!("unknown extract naming `{other}'")),
        }
    }
}

/// Join `rel` under `root`, refusing anything that could escape it.
pub fn safe_join(root: &Path, rel: &Path) -> Option<PathBuf> {
    if rel.as_os_str().is_empty() {
        return None;
    }
    for c in rel.components() {
        match c {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(root.join(rel))
}

/// Local relative path for a virtual path, or `None` when it is rooted.
pub fn local_relative_path(
    virtual_path: &[u8],
    naming: ExtractNaming,
    codec: &dyn NativeCodec,
) -> Option<PathBuf> {
    if matches!(virtual_path.first(), Some(b'\\' | b'/')) {
        return None;
    }
    let mut rel = PathBuf::new();
    match naming {
        ExtractNaming::Unicode => {
            let decoded = codec.decode_native_to_portable(virtual_path);
            for seg in decoded.split('\\').filter(|s| !s.is_empty()) {
                rel.push(seg);
            }
        }
        ExtractNaming::Native => {
            for seg in virtual_path.split(|&b| b == b'\\').filter(|s| !s.is_empty()) {
                rel.push(native_segment(seg, codec));
            }
        }
    }
    Some(rel)
}

#[cfg(unix)]
fn native_segment(seg: &[u8], _codec: &dyn NativeCodec) -> std::ffi::OsString {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::OsStr::from_bytes(seg).to_os_string()
}

#[cfg(not(unix))]
fn native_segment(seg: &[u8], codec: &dyn NativeCodec) -> std::ffi::OsString {
    codec.decode_native_to_portable(seg).into()
}

/// Write one entry below `dest`. Partial output is removed on failure.
fn extract_one(
    archive: &dyn GrfArchive,
    entry: &ArchiveEntry,
    dest: &Path,
    naming: ExtractNaming,
    codec: &dyn NativeCodec,
) -> Result<PathBuf> {
    let out = local_relative_path(&entry.virtual_path, naming, codec)
        .and_then(|rel| safe_join(dest, &rel))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "unsafe path: {}",
                    codec.decode_native_to_portable(&entry.virtual_path)
                ),
            )
        })?;
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }

    let written = File::create(&out).map_err(GrfError::from).and_then(|f| {
        let mut w = BufWriter::new(f);
        let n = archive.read_entry(entry.id, &mut w)?;
        w.flush()?;
        Ok(n)
    });
    let failure = match written {
        Ok(n) if n == entry.size => return Ok(out),
        Ok(n) => GrfError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("extracted {n} bytes, expected {}", entry.size),
        )),
        Err(e) => e,
    };
    let _ = fs::remove_file(&out);
    Err(failure)
}

/// Extract the given entries below `dest`, in order.
///
/// Every id is checked up front; a stale one fails the call with
/// [`GrfError::NotFound`] before anything is written. An entry that cannot be
/// written is logged, counted in `skipped` and the batch moves on.
pub fn extract_many(
    archive: &dyn GrfArchive,
    ids: &[EntryId],
    dest: &Path,
    naming: ExtractNaming,
    codec: &dyn NativeCodec,
    sink: &mut dyn ProgressSink,
) -> Result<BatchReport> {
    let entries = ids
        .iter()
        .map(|&id| archive.entry(id).ok_or(GrfError::NotFound(id)))
        .collect::<Result<Vec<_>>>()?;
    run_extract(archive, &entries, dest, naming, codec, sink)
}

/// Extract every entry, in archive order.
pub fn extract_all(
    archive: &dyn GrfArchive,
    dest: &Path,
    naming: ExtractNaming,
    codec: &dyn NativeCodec,
    sink: &mut dyn ProgressSink,
) -> Result<BatchReport> {
    run_extract(archive, &archive.entries(), dest, naming, codec, sink)
}

fn run_extract(
    archive: &dyn GrfArchive,
    entries: &[ArchiveEntry],
    dest: &Path,
    naming: ExtractNaming,
    codec: &dyn NativeCodec,
    sink: &mut dyn ProgressSink,
) -> Result<BatchReport> {
    let total = entries.len() as u64;
    info!(dest = %dest.display(), total, %naming, "extracting");
    fs::create_dir_all(dest)?;

    let mut report = BatchReport {
        status: BatchStatus::Completed,
        completed: 0,
        total,
        skipped: 0,
    };
    if !sink.on_progress(&Progress::new(0, total, "")) {
        report.status = BatchStatus::Cancelled;
        return Ok(report);
    }

    for entry in entries {
        let label = codec.decode_native_to_portable(&entry.virtual_path);
        match extract_one(archive, entry, dest, naming, codec) {
            Ok(path) => debug!(path = %path.display(), "extracted"),
            Err(e) => {
                warn!(entry = %label, error = %e, "skipping entry");
                report.skipped += 1;
            }
        }
        report.completed += 1;
        if !sink.on_progress(&Progress::new(report.completed, total, label)) {
            report.status = BatchStatus::Cancelled;
            break;
        }
    }

    info!(
        completed = report.completed,
        skipped = report.skipped,
        status = ?report.status,
        "extraction finished"
    );
    Ok(report)
}
