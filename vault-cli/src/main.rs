use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use vault_core::remote::RemotePool;
use vault_core::version::parse_version_ref;
use vault_core::{CancelToken, Collection, CollectionConfig};

#[derive(Parser)]
#[command(name = "vault", version, about = "Deduplicating versioned backups")]
struct Cli {
    /// Log periodic progress of uploads and restores
    #[arg(long, global = true)]
    progress: bool,
    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a collection here and restore the remote's latest version
    Init { remote: String },
    /// Commit the working tree as a new version
    Version {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Show changes against the latest version
    Diff,
    /// List committed versions
    ListVersions,
    /// Make the working tree match a version (deletes untracked files)
    Restore {
        version: String,
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = CollectionConfig { progress: cli.progress, ..Default::default() };
    let cancel = CancelToken::new();
    let cwd = std::env::current_dir().context("current directory")?;
    match cli.cmd {
        Cmd::Init { remote } => init(&cwd, &remote, config, &cancel)?,
        Cmd::Version { message } => commit(&cwd, &message.join(" "), config, &cancel)?,
        Cmd::Diff => diff(&cwd, config)?,
        Cmd::ListVersions => list_versions(&cwd, config)?,
        Cmd::Restore { version, yes } => restore(&cwd, &version, yes, config, &cancel)?,
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn open(cwd: &Path, config: CollectionConfig) -> Result<Collection> {
    let pool = RemotePool::new()?;
    Collection::discover(cwd, pool, config).context("no collection here (run `vault init <remote>`)")
}

fn init(cwd: &Path, remote: &str, config: CollectionConfig, cancel: &CancelToken) -> Result<()> {
    let pool = RemotePool::new()?;
    let coll = Collection::create_at(cwd, remote, pool, cancel, config)
        .with_context(|| format!("init collection in {} with remote {remote}", cwd.display()))?;
    if coll.restore_last_version(cancel).context("restore latest version")?.is_none() {
        eprintln!("Remote has no versions yet");
    }
    Ok(())
}

fn commit(cwd: &Path, message: &str, config: CollectionConfig, cancel: &CancelToken) -> Result<()> {
    let coll = open(cwd, config)?;
    let report = coll.commit_version(message, cancel).context("commit version")?;
    eprintln!(
        "{} file(s), {} chunk(s), {} uploaded ({} bytes)",
        report.files, report.push.chunks_total, report.push.chunks_uploaded, report.push.bytes_uploaded
    );
    println!("v{}", report.version);
    Ok(())
}

fn diff(cwd: &Path, config: CollectionConfig) -> Result<()> {
    let coll = open(cwd, config)?;
    for entry in coll.diff_latest().context("diff working tree")? {
        println!("{entry}");
    }
    Ok(())
}

fn list_versions(cwd: &Path, config: CollectionConfig) -> Result<()> {
    let coll = open(cwd, config)?;
    for (n, ver) in coll.versions().context("read versions")?.iter().enumerate() {
        let created = ver
            .created
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("v{n} | {created} | {}", ver.message);
    }
    Ok(())
}

fn restore(
    cwd: &Path,
    version: &str,
    yes: bool,
    config: CollectionConfig,
    cancel: &CancelToken,
) -> Result<()> {
    let n = parse_version_ref(version)?;
    let coll = open(cwd, config)?;
    if !yes && !confirm(&format!(
        "Restore v{n} into {}? Files not in v{n} will be deleted. [y/N] ",
        coll.root().display()
    ))? {
        eprintln!("Aborted");
        return Ok(());
    }
    let report = coll
        .restore_version(n, coll.root(), cancel)
        .with_context(|| format!("restore v{n}"))?;
    eprintln!(
        "Restored {} file(s), removed {}, {} bytes",
        report.files_written,
        report.files_removed.len(),
        report.bytes_written
    );
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("read confirmation")?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
