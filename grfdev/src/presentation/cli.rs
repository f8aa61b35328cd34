use clap::{Parser, Subcommand};
use grf_core::{ExtractNaming, RepackPolicy};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "grfdev: GRF archive tool (alpha)", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to ~/.grfdev.json)
    #[arg(long, global = true, env = "GRFDEV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not draw progress bars
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty archive (overwrites)
    New { archive: PathBuf },

    /// Print archive statistics
    Info { archive: PathBuf },

    /// List entries
    Ls {
        archive: PathBuf,
        /// show id, size, stored size and cipher
        #[arg(long)]
        long: bool,
    },

    /// Print the directory tree with aggregate sizes
    Tree {
        archive: PathBuf,
        /// start below this virtual directory (e.g. "data\\sprite")
        #[arg(long)]
        path: Option<String>,
    },

    /// Find entries by wildcard pattern, case-insensitive
    Search { archive: PathBuf, pattern: String },

    /// Add every file below a local directory
    AddDir {
        archive: PathBuf,
        dir: PathBuf,
        /// virtual directory to add under; "" adds at the archive root
        #[arg(long, default_value = "data\\")]
        prefix: String,
        /// compression level, 0 stores
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: Option<u32>,
    },

    /// Merge another archive into this one; its entries win on conflicts
    Merge {
        archive: PathBuf,
        source: PathBuf,
        /// move-only | decrypt | recompress
        #[arg(long)]
        policy: Option<RepackPolicy>,
    },

    /// Rewrite the archive to reclaim wasted space
    Repack {
        archive: PathBuf,
        /// move-only | decrypt | recompress
        #[arg(long)]
        policy: Option<RepackPolicy>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: Option<u32>,
    },

    /// Delete entries; directories are removed with everything below them
    Rm {
        archive: PathBuf,
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Extract entries or directories
    Extract {
        archive: PathBuf,
        dest: PathBuf,
        #[arg(required = true)]
        paths: Vec<String>,
        /// unicode | native
        #[arg(long)]
        naming: Option<ExtractNaming>,
    },

    /// Extract the whole archive
    ExtractAll {
        archive: PathBuf,
        dest: PathBuf,
        #[arg(long)]
        naming: Option<ExtractNaming>,
    },

    #[command(subcommand)]
    /// Show or change persistent settings
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    Show,
    SetLevel {
        #[arg(value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,
    },
    SetPolicy { policy: RepackPolicy },
    SetNaming { naming: ExtractNaming },
}
