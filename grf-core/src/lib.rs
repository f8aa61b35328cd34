#![forbid(unsafe_code)]

pub mod error;
pub mod domain;

pub mod util {
    pub mod size;
}

pub mod codec;

pub mod container {
    pub mod manifest;
    pub mod superblock;
}

pub mod encoding;
pub mod repo;
pub mod repo_factory;
pub mod repo_fs;

pub mod batch;
pub mod filter;
pub mod scan;
pub mod select;
pub mod settings;
pub mod stats;
pub mod tree;

// Re-exports: stable API surface
pub use batch::{
    BatchReport, BatchStatus, CancelFlag, Cancellable, ExtractNaming, NoProgress, Progress,
    ProgressSink, add_directory, add_many, delete_many, extract_all, extract_many, merge,
    merge_file, repack,
};
pub use domain::{ArchiveEntry, EntryId, RepackPolicy, StorageFlags};
pub use encoding::{EucKr, NativeCodec};
pub use error::{GrfError, Result};
pub use repo::{GrfArchive, OpenParams};
pub use repo_factory::{Backend, create_repo, open_repo};
pub use tree::{NodeId, VirtualTree};
