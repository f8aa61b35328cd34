//! Batch operations over an archive.
//!
//! Each operation fixes its unit count, reports `(completed, total, label)`
//! after every unit and stops at the first unit boundary where the sink
//! answers `false`. Mutating batches always end with `save()`, also when
//! cancelled, so the units already processed survive a reopen.

pub mod extract;
pub mod progress;

use std::fs::File;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::domain::{EntryId, RepackPolicy};
use crate::encoding::NativeCodec;
use crate::error::{GrfError, Result};
use crate::repo::{GrfArchive, OpenParams};
use crate::repo_factory::{Backend, open_repo};
use crate::scan::{ScanEntry, scan_directory_with};

pub use extract::{ExtractNaming, extract_all, extract_many, safe_join};
pub use progress::{
    BatchReport, BatchStatus, CancelFlag, Cancellable, NoProgress, Progress, ProgressSink,
};

fn start(sink: &mut dyn ProgressSink, total: u64) -> BatchReport {
    let status = if sink.on_progress(&Progress::new(0, total, "")) {
        BatchStatus::Completed
    } else {
        BatchStatus::Cancelled
    };
    BatchReport {
        status,
        completed: 0,
        total,
        skipped: 0,
    }
}

/// Add scanned files, in order.
///
/// A source that cannot be opened or read stops the batch: the entries added
/// so far are saved and [`GrfError::Ingest`] reports how many there were.
pub fn add_many(
    archive: &mut dyn GrfArchive,
    files: &[ScanEntry],
    sink: &mut dyn ProgressSink,
) -> Result<BatchReport> {
    let mut report = start(sink, files.len() as u64);
    info!(total = report.total, "adding files");

    if !report.is_cancelled() {
        for f in files {
            let added = File::open(&f.source_path)
                .map_err(GrfError::from)
                .and_then(|mut src| archive.add_entry(&f.native_path, &mut src));
            match added {
                Ok(id) => debug!(%id, path = %f.virtual_path, "added"),
                Err(GrfError::Io(source)) => {
                    archive.save()?;
                    return Err(GrfError::Ingest {
                        path: f.source_path.clone(),
                        committed: report.completed,
                        source,
                    });
                }
                Err(e) => return Err(e),
            }
            report.completed += 1;
            if !sink.on_progress(&Progress::new(report.completed, report.total, &f.virtual_path)) {
                report.status = BatchStatus::Cancelled;
                break;
            }
        }
    }

    archive.save()?;
    info!(completed = report.completed, status = ?report.status, "add finished");
    Ok(report)
}

/// Scan `root` under `prefix` and add everything found.
///
/// The sink sees the scan first (see [`scan_directory_with`]); cancelling
/// there adds nothing.
pub fn add_directory(
    archive: &mut dyn GrfArchive,
    root: &Path,
    prefix: &str,
    codec: &dyn NativeCodec,
    sink: &mut dyn ProgressSink,
) -> Result<BatchReport> {
    let Some(files) = scan_directory_with(root, prefix, codec, sink)? else {
        archive.save()?;
        return Ok(BatchReport {
            status: BatchStatus::Cancelled,
            completed: 0,
            total: 0,
            skipped: 0,
        });
    };
    add_many(archive, &files, sink)
}

/// Fold `src` into `dst`. Entries of `src` win on path conflicts.
pub fn merge(
    dst: &mut dyn GrfArchive,
    src: &dyn GrfArchive,
    policy: RepackPolicy,
    codec: &dyn NativeCodec,
    sink: &mut dyn ProgressSink,
) -> Result<BatchReport> {
    let mut report = start(sink, src.file_count());
    info!(total = report.total, %policy, "merging");

    if !report.is_cancelled() {
        let mut completed = 0;
        let merged = dst.merge(src, policy, &mut |done: u64, total: u64, label: &[u8]| {
            completed = done;
            sink.on_progress(&Progress::new(done, total, codec.decode_native_to_portable(label)))
        });
        match merged {
            Ok(status) => {
                report.completed = completed;
                report.status = status;
            }
            Err(e) => {
                warn!(committed = completed, error = %e, "merge stopped");
                dst.save()?;
                return Err(GrfError::Interrupted {
                    committed: completed,
                    source: Box::new(e),
                });
            }
        }
    }

    dst.save()?;
    info!(completed = report.completed, status = ?report.status, "merge finished");
    Ok(report)
}

/// Open the archive at `src_path` read-only and merge it into `dst`.
/// A source that fails validation is rejected before `dst` is touched.
pub fn merge_file(
    dst: &mut dyn GrfArchive,
    src_path: &Path,
    policy: RepackPolicy,
    codec: &dyn NativeCodec,
    sink: &mut dyn ProgressSink,
) -> Result<BatchReport> {
    let src = open_repo(Backend::default(), &OpenParams::new(src_path).read_only())?;
    merge(dst, src.as_ref(), policy, codec, sink)
}

/// Rewrite the archive to reclaim wasted space.
pub fn repack(
    archive: &mut dyn GrfArchive,
    policy: RepackPolicy,
    codec: &dyn NativeCodec,
    sink: &mut dyn ProgressSink,
) -> Result<BatchReport> {
    let mut report = start(sink, archive.file_count());
    let wasted = archive.wasted_space();
    info!(total = report.total, %policy, wasted, "repacking");

    if !report.is_cancelled() {
        let mut completed = 0;
        let repacked = archive.repack(policy, &mut |done: u64, total: u64, label: &[u8]| {
            completed = done;
            sink.on_progress(&Progress::new(done, total, codec.decode_native_to_portable(label)))
        });
        match repacked {
            Ok(status) => {
                report.completed = completed;
                report.status = status;
            }
            // A failed rewrite leaves the archive as it was; keep what was pending.
            Err(e) => {
                warn!(error = %e, "repack failed");
                archive.save()?;
                return Err(e);
            }
        }
    }

    archive.save()?;
    info!(
        completed = report.completed,
        status = ?report.status,
        reclaimed = wasted.saturating_sub(archive.wasted_space()),
        "repack finished"
    );
    Ok(report)
}

/// Delete entries, in order. Ids already gone count as processed units.
pub fn delete_many(
    archive: &mut dyn GrfArchive,
    ids: &[EntryId],
    codec: &dyn NativeCodec,
    sink: &mut dyn ProgressSink,
) -> Result<BatchReport> {
    let mut report = start(sink, ids.len() as u64);
    info!(total = report.total, "deleting");

    if !report.is_cancelled() {
        for &id in ids {
            let label = archive
                .entry(id)
                .map(|e| codec.decode_native_to_portable(&e.virtual_path))
                .unwrap_or_else(|| id.to_string());
            if !archive.delete_entry(id)? {
                debug!(%id, "already deleted");
            }
            report.completed += 1;
            if !sink.on_progress(&Progress::new(report.completed, report.total, label)) {
                report.status = BatchStatus::Cancelled;
                break;
            }
        }
    }

    archive.save()?;
    info!(completed = report.completed, status = ?report.status, "delete finished");
    Ok(report)
}
