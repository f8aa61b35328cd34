//! Persistent user settings, stored as JSON.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::batch::extract::ExtractNaming;
use crate::domain::RepackPolicy;
use crate::error::{GrfError, Result};

pub const MAX_COMPRESSION_LEVEL: u32 = 9;
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 5;
pub const MAX_RECENT_FILES: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub compression_level: u32,
    #[serde(deserialize_with = "lenient_policy")]
    pub repack_policy: RepackPolicy,
    #[serde(deserialize_with = "lenient_naming")]
    pub extract_naming: ExtractNaming,
    /// Most recent first.
    pub recent_files: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            repack_policy: RepackPolicy::default(),
            extract_naming: ExtractNaming::default(),
            recent_files: Vec::new(),
        }
    }
}

// Unknown or mistyped values fall back to the default instead of failing the load.
fn lenient_policy<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<RepackPolicy, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(v.as_str().and_then(|s| s.parse().ok()).unwrap_or_default())
}

fn lenient_naming<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<ExtractNaming, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(v.as_str().and_then(|s| s.parse().ok()).unwrap_or_default())
}

impl Settings {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let mut s: Settings = serde_json::from_slice(&bytes)
            .map_err(|e| GrfError::Settings(format!("{}: {e}", path.display())))?;
        s.compression_level = s.compression_level.min(MAX_COMPRESSION_LEVEL);
        s.recent_files.truncate(MAX_RECENT_FILES);
        Ok(s)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| GrfError::Settings(format!("serialize: {e}")))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn set_compression_level(&mut self, level: u32) {
        self.compression_level = level.min(MAX_COMPRESSION_LEVEL);
    }

    /// Remember `path` unless it is already listed. Returns whether it was added.
    pub fn add_recent_file(&mut self, path: &Path) -> bool {
        if self.recent_files.iter().any(|p| p == path) {
            return false;
        }
        self.recent_files.insert(0, path.to_path_buf());
        self.recent_files.truncate(MAX_RECENT_FILES);
        true
    }
}
