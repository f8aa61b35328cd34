use std::io;
use std::path::{Path, PathBuf};

use grf_core::error::{GrfError, Result};
use grf_core::filter::search;
use grf_core::repo::{GrfArchive, OpenParams};
use grf_core::repo_factory::{Backend, create_repo, open_repo};
use grf_core::select::resolve_paths;
use grf_core::stats::ArchiveStats;
use grf_core::tree::{NodeId, VirtualTree};
use grf_core::util::size::format_size;
use grf_core::{BatchReport, EucKr, ExtractNaming, NativeCodec, RepackPolicy};
use tracing::warn;

use super::Context;
use crate::presentation::progress::sink;

fn repo_from_args(ctx: &mut Context, archive: &Path, writable: bool) -> Result<Box<dyn GrfArchive>> {
    let mut params =
        OpenParams::new(archive).with_compression_level(ctx.settings.compression_level);
    if !writable {
        params = params.read_only();
    }
    let repo = open_repo(Backend::Fs, &params)?;
    remember(ctx, archive);
    Ok(repo)
}

// A settings file we cannot write should not fail the archive command.
fn remember(ctx: &mut Context, archive: &Path) {
    let path = std::fs::canonicalize(archive).unwrap_or_else(|_| archive.to_path_buf());
    if ctx.settings.add_recent_file(&path) {
        if let Err(e) = ctx.settings.save(&ctx.config_path) {
            warn!(error = %e, "could not record recent file");
        }
    }
}

fn not_found(what: &str) -> GrfError {
    io::Error::new(io::ErrorKind::NotFound, format!("not in archive: {what}")).into()
}

fn summarize(verb: &str, report: &BatchReport) {
    if report.is_cancelled() {
        eprintln!("{verb}: cancelled after {}/{} entries", report.completed, report.total);
    } else if report.skipped > 0 {
        println!("{verb}: {} entries, {} skipped", report.completed, report.skipped);
    } else {
        println!("{verb}: {} entries", report.completed);
    }
}

pub fn handle_new(ctx: &mut Context, archive: PathBuf) -> Result<()> {
    let params = OpenParams::new(&archive).with_compression_level(ctx.settings.compression_level);
    create_repo(Backend::Fs, &params)?;
    remember(ctx, &archive);
    println!("created {}", archive.display());
    Ok(())
}

pub fn handle_info(ctx: &mut Context, archive: PathBuf) -> Result<()> {
    let repo = repo_from_args(ctx, &archive, false)?;
    let tree = VirtualTree::from_archive(repo.as_ref(), &EucKr);
    let s = ArchiveStats::collect(repo.as_ref(), &tree);
    println!("files:       {}", s.files);
    println!("directories: {}", s.dirs);
    println!("content:     {}", format_size(s.logical_bytes));
    println!("stored:      {}", format_size(s.stored_bytes));
    println!("archive:     {}", format_size(s.storage_len));
    println!(
        "wasted:      {} ({:.1}% reclaimable)",
        format_size(s.wasted_bytes),
        s.reclaimable_pct
    );
    if s.encrypted_files > 0 {
        println!("encrypted:   {}", s.encrypted_files);
    }
    if tree.skipped_entries() > 0 {
        println!("unplaceable: {}", tree.skipped_entries());
    }
    Ok(())
}

pub fn handle_ls(ctx: &mut Context, archive: PathBuf, long: bool) -> Result<()> {
    let repo = repo_from_args(ctx, &archive, false)?;
    for e in repo.entries() {
        let path = EucKr.decode_native_to_portable(&e.virtual_path);
        if long {
            let cipher = match e.flags.cipher() {
                Some(c) => format!("{c:?}"),
                None => "-".to_string(),
            };
            println!(
                "{:>6}  {:>12}  {:>12}  {:<8}  {}",
                e.id.0, e.size, e.storage_size, cipher, path
            );
        } else {
            println!("{path}");
        }
    }
    Ok(())
}

fn print_tree(tree: &VirtualTree, at: NodeId, depth: usize) {
    for &c in tree.children(at) {
        let Some(node) = tree.node(c) else { continue };
        let indent = "  ".repeat(depth);
        if node.is_dir() {
            println!(
                "{indent}{}\\  ({})",
                node.display_name,
                format_size(node.aggregate_size)
            );
            print_tree(tree, c, depth + 1);
        } else {
            println!("{indent}{}  {}", node.display_name, format_size(node.aggregate_size));
        }
    }
}

pub fn handle_tree(ctx: &mut Context, archive: PathBuf, path: Option<String>) -> Result<()> {
    let repo = repo_from_args(ctx, &archive, false)?;
    let mut tree = VirtualTree::from_archive(repo.as_ref(), &EucKr);
    tree.sort_by_name();
    let start = match path.as_deref() {
        Some(p) => tree.find(p).ok_or_else(|| not_found(p))?,
        None => tree.root(),
    };
    print_tree(&tree, start, 0);
    Ok(())
}

pub fn handle_search(ctx: &mut Context, archive: PathBuf, pattern: String) -> Result<()> {
    let repo = repo_from_args(ctx, &archive, false)?;
    let entries = repo.entries();
    let hits = search(&entries, &pattern, &EucKr);
    for id in &hits {
        if let Some(e) = repo.entry(*id) {
            println!("{}", EucKr.decode_native_to_portable(&e.virtual_path));
        }
    }
    if hits.is_empty() {
        eprintln!("no match for `{pattern}'");
    }
    Ok(())
}

pub fn handle_add_dir(
    ctx: &mut Context,
    archive: PathBuf,
    dir: PathBuf,
    prefix: String,
    level: Option<u32>,
) -> Result<()> {
    let mut repo = repo_from_args(ctx, &archive, true)?;
    if let Some(l) = level {
        repo.set_compression_level(l);
    }
    let mut bar = sink("add", ctx.quiet, &ctx.cancel);
    let report = grf_core::add_directory(repo.as_mut(), &dir, &prefix, &EucKr, &mut bar)?;
    bar.get_ref().finish(&report);
    summarize("add", &report);
    Ok(())
}

pub fn handle_merge(
    ctx: &mut Context,
    archive: PathBuf,
    source: PathBuf,
    policy: Option<RepackPolicy>,
) -> Result<()> {
    let policy = policy.unwrap_or(ctx.settings.repack_policy);
    let mut repo = repo_from_args(ctx, &archive, true)?;
    let mut bar = sink("merge", ctx.quiet, &ctx.cancel);
    let report = grf_core::merge_file(repo.as_mut(), &source, policy, &EucKr, &mut bar)?;
    bar.get_ref().finish(&report);
    summarize("merge", &report);
    Ok(())
}

pub fn handle_repack(
    ctx: &mut Context,
    archive: PathBuf,
    policy: Option<RepackPolicy>,
    level: Option<u32>,
) -> Result<()> {
    let policy = policy.unwrap_or(ctx.settings.repack_policy);
    let mut repo = repo_from_args(ctx, &archive, true)?;
    if let Some(l) = level {
        repo.set_compression_level(l);
    }
    let before = repo.storage_len();
    let mut bar = sink("repack", ctx.quiet, &ctx.cancel);
    let report = grf_core::repack(repo.as_mut(), policy, &EucKr, &mut bar)?;
    bar.get_ref().finish(&report);
    summarize("repack", &report);
    println!(
        "size: {} -> {}",
        format_size(before),
        format_size(repo.storage_len())
    );
    Ok(())
}

pub fn handle_rm(ctx: &mut Context, archive: PathBuf, paths: Vec<String>) -> Result<()> {
    let mut repo = repo_from_args(ctx, &archive, true)?;
    let tree = VirtualTree::from_archive(repo.as_ref(), &EucKr);
    let (ids, missing) = resolve_paths(&tree, &paths);
    for m in &missing {
        eprintln!("rm: no such entry `{m}'");
    }
    let mut bar = sink("rm", ctx.quiet, &ctx.cancel);
    let report = grf_core::delete_many(repo.as_mut(), &ids, &EucKr, &mut bar)?;
    bar.get_ref().finish(&report);
    summarize("rm", &report);
    Ok(())
}

pub fn handle_extract(
    ctx: &mut Context,
    archive: PathBuf,
    dest: PathBuf,
    paths: Vec<String>,
    naming: Option<ExtractNaming>,
) -> Result<()> {
    let naming = naming.unwrap_or(ctx.settings.extract_naming);
    let repo = repo_from_args(ctx, &archive, false)?;
    let tree = VirtualTree::from_archive(repo.as_ref(), &EucKr);
    let (ids, missing) = resolve_paths(&tree, &paths);
    if let Some(m) = missing.first() {
        return Err(not_found(m));
    }
    let mut bar = sink("extract", ctx.quiet, &ctx.cancel);
    let report = grf_core::extract_many(repo.as_ref(), &ids, &dest, naming, &EucKr, &mut bar)?;
    bar.get_ref().finish(&report);
    summarize("extract", &report);
    Ok(())
}

pub fn handle_extract_all(
    ctx: &mut Context,
    archive: PathBuf,
    dest: PathBuf,
    naming: Option<ExtractNaming>,
) -> Result<()> {
    let naming = naming.unwrap_or(ctx.settings.extract_naming);
    let repo = repo_from_args(ctx, &archive, false)?;
    let mut bar = sink("extract", ctx.quiet, &ctx.cancel);
    let report = grf_core::extract_all(repo.as_ref(), &dest, naming, &EucKr, &mut bar)?;
    bar.get_ref().finish(&report);
    summarize("extract", &report);
    Ok(())
}

pub fn handle_config_show(ctx: &Context) -> Result<()> {
    let s = &ctx.settings;
    println!("config:            {}", ctx.config_path.display());
    println!("compression_level: {}", s.compression_level);
    println!("repack_policy:     {}", s.repack_policy);
    println!("extract_naming:    {}", s.extract_naming);
    for (i, p) in s.recent_files.iter().enumerate() {
        println!("recent[{i}]:         {}", p.display());
    }
    Ok(())
}

pub fn handle_config_save(ctx: &Context) -> Result<()> {
    ctx.settings.save(&ctx.config_path)?;
    println!("saved {}", ctx.config_path.display());
    Ok(())
}
