//! vpkit CLI - Command-line tool for FreeSpace VP archives.
//!
//! This is the main entry point for the vpkit command-line application.

use std::collections::HashSet;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use vpkit::prelude::*;
use vpkit::vp::{create_with_progress, extract_with_progress};

/// vpkit - FreeSpace VP archive tool
#[derive(Parser)]
#[command(name = "vpkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Print the full error report on failure
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the contents of a VP archive
    List {
        /// Path to the VP file
        #[arg(env = "VPKIT_ARCHIVE")]
        archive: PathBuf,

        /// Filter pattern (glob-style, matched against the full path)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show size, timestamp and offset
        #[arg(short, long)]
        long: bool,

        /// Show the CRC32 of each file
        #[arg(long)]
        crc: bool,

        /// Fold names to lowercase
        #[arg(long)]
        lowercase: bool,
    },

    /// Extract files from a VP archive
    Extract {
        /// Path to the VP file
        #[arg(env = "VPKIT_ARCHIVE")]
        archive: PathBuf,

        /// Output directory
        #[arg(short, long, env = "VPKIT_OUTPUT", default_value = ".")]
        output: PathBuf,

        /// Filter pattern (glob-style, matched against the full path)
        #[arg(short, long)]
        filter: Option<String>,

        /// Fold names to lowercase
        #[arg(long)]
        lowercase: bool,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,

        /// Write file data to stdout instead of disk
        #[arg(long)]
        pipe: bool,
    },

    /// Build a VP archive from a `data` directory
    Create {
        /// Source directory, must be named `data`
        source: PathBuf,

        /// Archive to write
        destination: PathBuf,

        /// Validate and report, but write nothing
        #[arg(long)]
        noop: bool,
    },

    /// Report overrides and shadows across a load list
    Dupes {
        /// Search directories, highest priority first
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Report byte-identical files instead
        #[arg(long)]
        checksum: bool,

        /// Ignore duplicates held only by these archives (repeatable)
        #[arg(short = 'x', long = "exclude", value_name = "NAME")]
        exclude: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.debug {
                eprintln!("error: {:?}", e);
            } else {
                eprintln!("error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::List {
            archive,
            filter,
            long,
            crc,
            lowercase,
        } => cmd_list(&archive, filter.as_deref(), lowercase, long, crc),
        Commands::Extract {
            archive,
            output,
            filter,
            lowercase,
            force,
            pipe,
        } => {
            let read = read_options(filter.as_deref(), lowercase)?;
            if pipe {
                cmd_pipe(&archive, &read)
            } else {
                cmd_extract(&archive, &output, &read, force)
            }
        }
        Commands::Create {
            source,
            destination,
            noop,
        } => cmd_create(&source, &destination, noop),
        Commands::Dupes {
            dirs,
            checksum,
            exclude,
        } => cmd_dupes(&dirs, checksum, exclude),
    }
}

fn read_options(filter: Option<&str>, lowercase: bool) -> Result<ReadOptions> {
    let options = match filter {
        Some(pattern) => ReadOptions::with_filter(pattern)
            .with_context(|| format!("Invalid filter pattern {:?}", pattern))?,
        None => ReadOptions::default(),
    };
    Ok(options.lowercase(lowercase))
}

fn open_archive(path: &Path) -> Result<VpArchive> {
    VpArchive::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn cmd_list(
    path: &Path,
    filter: Option<&str>,
    lowercase: bool,
    long: bool,
    crc: bool,
) -> Result<()> {
    let mut archive = open_archive(path)?;
    let entries = archive
        .collect_entries(&read_options(filter, lowercase)?)
        .context("Failed to read entry table")?;

    let mut files = 0;
    let mut bytes = 0u64;
    for entry in &entries {
        let shown = if entry.is_dir() {
            format!("{}/", entry.path())
        } else {
            files += 1;
            bytes += u64::from(entry.size());
            entry.path().to_string()
        };

        let checksum = match (crc, entry.is_file()) {
            (true, true) => format!("{:08x} ", archive.crc32(entry)?),
            (true, false) => format!("{:8} ", ""),
            (false, _) => String::new(),
        };

        if long {
            println!(
                "{:>10} {:>10} {:>10} {}{}",
                entry.size(),
                entry.timestamp(),
                entry.offset(),
                checksum,
                shown
            );
        } else {
            println!("{}{}", checksum, shown);
        }
    }

    println!(
        "\nTotal: {} entries, {} files, {} bytes",
        entries.len(),
        files,
        bytes
    );

    Ok(())
}

fn cmd_extract(path: &Path, output: &Path, read: &ReadOptions, force: bool) -> Result<()> {
    let mut archive = open_archive(path)?;
    let total = archive.collect_entries(read)?.len();

    println!("Extracting {} entries from {}...", total, archive.name());

    let options = ExtractOptions {
        overwrite: force,
        ..Default::default()
    };
    let pb = progress_bar(total as u64)?;

    let start = Instant::now();
    let report = extract_with_progress(&mut archive, output, read, &options, |_| pb.inc(1))
        .with_context(|| format!("Failed to extract into {}", output.display()))?;
    pb.finish_and_clear();

    println!(
        "Extracted {} files ({} bytes), {} directories in {:?}",
        report.files,
        report.bytes,
        report.directories,
        start.elapsed()
    );
    if !report.skipped_existing.is_empty() {
        println!(
            "Kept {} existing files (use --force to overwrite)",
            report.skipped_existing.len()
        );
    }
    if !report.conflicts.is_empty() {
        println!("Skipped {} entries that conflict with files on disk", report.conflicts.len());
    }

    Ok(())
}

fn cmd_pipe(path: &Path, read: &ReadOptions) -> Result<()> {
    let mut archive = open_archive(path)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    pipe(&mut archive, read, &mut out).context("Failed to write to stdout")?;
    Ok(())
}

fn cmd_create(source: &Path, destination: &Path, noop: bool) -> Result<()> {
    let options = CreateOptions { dry_run: noop };

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {pos} files {msg}")?);

    let start = Instant::now();
    let report = create_with_progress(source, destination, &options, |entry| {
        pb.set_message(entry.path().to_string());
        pb.inc(1);
    })
    .with_context(|| format!("Failed to create {}", destination.display()))?;
    pb.finish_and_clear();

    if noop {
        for entry in &report.entries {
            if entry.is_dir() {
                println!("{}/", entry.path());
            } else {
                println!("{} ({} bytes)", entry.path(), entry.size());
            }
        }
    }
    for skipped in &report.skipped_empty {
        println!("Skipped empty file {}", skipped.display());
    }

    println!(
        "{} {} files, {} directories, {} bytes in {:?}",
        if noop { "Would write" } else { "Wrote" },
        report.files,
        report.directories,
        report.archive_size,
        start.elapsed()
    );

    Ok(())
}

fn cmd_dupes(dirs: &[PathBuf], checksum: bool, exclude: Vec<String>) -> Result<()> {
    let options = DupesOptions {
        mode: if checksum {
            MatchMode::Checksum
        } else {
            MatchMode::LoadOrder
        },
        exclude: exclude.into_iter().collect::<HashSet<_>>(),
    };

    let findings = find_duplicates(dirs, &options).context("Failed to scan load list")?;
    for finding in &findings {
        println!("{}", finding);
    }

    Ok(())
}
