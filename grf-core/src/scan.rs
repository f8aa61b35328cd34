use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::batch::progress::{NoProgress, Progress, ProgressSink};
use crate::encoding::{EncodingVerdict, NativeCodec, classify, os_name_bytes};
use crate::error::{GrfError, Result};

/// A local file queued for ingestion under a virtual path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanEntry {
    pub source_path: PathBuf,
    /// `\`-separated display form.
    pub virtual_path: String,
    /// Same path in the archive encoding.
    pub native_path: Vec<u8>,
}

/// Walk `root` and map every regular file below it to `prefix` + its
/// relative path, segments joined with `\`.
///
/// Siblings are visited in file-name order, so the result is stable for a
/// given tree. Every name is classified on the way; the first unclassifiable
/// one aborts the scan with [`GrfError::Encoding`] and nothing is returned.
/// Symlinks are not followed and not collected.
pub fn scan_directory(root: &Path, prefix: &str, codec: &dyn NativeCodec) -> Result<Vec<ScanEntry>> {
    Ok(scan_directory_with(root, prefix, codec, &mut NoProgress)?.unwrap_or_default())
}

/// [`scan_directory`] with a sink polled after every file found.
///
/// The unit count is not known yet, so each discovery is reported as
/// `(0, 0, virtual_path)`. Returns `Ok(None)` when the sink cancels.
pub fn scan_directory_with(
    root: &Path,
    prefix: &str,
    codec: &dyn NativeCodec,
    sink: &mut dyn ProgressSink,
) -> Result<Option<Vec<ScanEntry>>> {
    if !root.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            format!("{} is not a directory", root.display()),
        )
        .into());
    }

    let mut prefix = prefix.to_string();
    if !prefix.is_empty() && !prefix.ends_with('\\') {
        prefix.push('\\');
    }
    let native_prefix = codec
        .encode_portable_to_native(&prefix)
        .ok_or_else(|| GrfError::Encoding {
            path: PathBuf::from(&prefix),
        })?;

    // stack[d - 1] holds the virtual prefix for entries at depth d.
    let mut stack: Vec<(String, Vec<u8>)> = vec![(prefix, native_prefix)];
    let mut out = Vec::new();

    for e in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let e = e.map_err(std::io::Error::from)?;
        stack.truncate(e.depth());
        let Some((parent_v, parent_n)) = stack.last().cloned() else {
            continue;
        };

        let name = os_name_bytes(e.file_name());
        let c = classify(&name, codec);
        if c.verdict == EncodingVerdict::Unclassifiable {
            return Err(GrfError::Encoding {
                path: e.path().to_path_buf(),
            });
        }

        let mut virtual_path = parent_v;
        virtual_path.push_str(&c.portable);
        let mut native_path = parent_n;
        native_path.extend_from_slice(&c.native);

        let ft = e.file_type();
        if ft.is_dir() {
            virtual_path.push('\\');
            native_path.push(b'\\');
            stack.push((virtual_path, native_path));
        } else if ft.is_file() {
            if !sink.on_progress(&Progress::new(0, 0, virtual_path.as_str())) {
                info!(root = %root.display(), found = out.len() + 1, "scan cancelled");
                return Ok(None);
            }
            out.push(ScanEntry {
                source_path: e.into_path(),
                virtual_path,
                native_path,
            });
        } else {
            debug!(path = %e.path().display(), "skipping non-regular file");
        }
    }

    info!(root = %root.display(), files = out.len(), "scanned directory");
    Ok(Some(out))
}
