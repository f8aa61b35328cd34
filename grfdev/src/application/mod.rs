pub mod handlers;

use std::path::PathBuf;

use clap::Parser;
use grf_core::CancelFlag;
use grf_core::error::Result;
use grf_core::settings::Settings;

use crate::presentation::cli::{Cli, Commands, ConfigCommands};
use crate::presentation::progress::install_interrupt;

/// What every handler gets besides its own arguments.
pub struct Context {
    pub settings: Settings,
    pub config_path: PathBuf,
    pub cancel: CancelFlag,
    pub quiet: bool,
}

fn default_config_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".grfdev.json"),
        None => PathBuf::from("grfdev.json"),
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let settings = Settings::load(&config_path)?;
    let mut ctx = Context {
        settings,
        config_path,
        cancel: CancelFlag::new(),
        quiet: cli.quiet,
    };
    install_interrupt(&ctx.cancel);

    match cli.command {
        Commands::New { archive } => handlers::handle_new(&mut ctx, archive),
        Commands::Info { archive } => handlers::handle_info(&mut ctx, archive),
        Commands::Ls { archive, long } => handlers::handle_ls(&mut ctx, archive, long),
        Commands::Tree { archive, path } => handlers::handle_tree(&mut ctx, archive, path),
        Commands::Search { archive, pattern } => handlers::handle_search(&mut ctx, archive, pattern),
        Commands::AddDir {
            archive,
            dir,
            prefix,
            level,
        } => handlers::handle_add_dir(&mut ctx, archive, dir, prefix, level),
        Commands::Merge {
            archive,
            source,
            policy,
        } => handlers::handle_merge(&mut ctx, archive, source, policy),
        Commands::Repack {
            archive,
            policy,
            level,
        } => handlers::handle_repack(&mut ctx, archive, policy, level),
        Commands::Rm { archive, paths } => handlers::handle_rm(&mut ctx, archive, paths),
        Commands::Extract {
            archive,
            dest,
            paths,
            naming,
        } => handlers::handle_extract(&mut ctx, archive, dest, paths, naming),
        Commands::ExtractAll {
            archive,
            dest,
            naming,
        } => handlers::handle_extract_all(&mut ctx, archive, dest, naming),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => handlers::handle_config_show(&ctx),
            ConfigCommands::SetLevel { level } => {
                ctx.settings.set_compression_level(level);
                handlers::handle_config_save(&ctx)
            }
            ConfigCommands::SetPolicy { policy } => {
                ctx.settings.repack_policy = policy;
                handlers::handle_config_save(&ctx)
            }
            ConfigCommands::SetNaming { naming } => {
                ctx.settings.extract_naming = naming;
                handlers::handle_config_save(&ctx)
            }
        },
    }
}
