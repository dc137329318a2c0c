use anyhow::{Context, Result};
use audiocull::config::DedupConfig;
use audiocull::core::decode::FfmpegDecoder;
use audiocull::core::duplicate::{DuplicateGroup, group_duplicates};
use audiocull::core::orchestrator::{RunOptions, run_with_progress};
use audiocull::error::DedupError;
use audiocull::services::history::{self, RestoreSelection};
use audiocull::services::report::{report_file_name, report_items};
use audiocull::services::scanner::scan_directory_with_progress;
use audiocull::services::cull::{self, CullOutcome};
use audiocull::services::{
    DestinationAllocator, HistoryWriter, copy_file, keep_destination, write_csv_report_file,
};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "audiocull",
    version,
    about = "CLI for culling near-duplicate audio files"
)]
struct Cli {
    /// Log per-file progress (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Duplicate workflows
    Duplicates {
        #[command(subcommand)]
        command: Dups,
    },

    /// Work with cull history
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },
}

#[derive(Args, Debug)]
struct FingerprintArgs {
    /// Fingerprint width in bits (1-64)
    #[arg(long, default_value_t = 64)]
    bits: usize,

    /// Maximum Hamming distance between duplicates; lower is stricter
    #[arg(long, default_value_t = 8)]
    threshold: u32,

    /// Seconds decoded from the start of each file
    #[arg(long, default_value_t = 8)]
    seconds: u32,

    /// Parallel decode workers (default: number of CPUs)
    #[arg(long)]
    workers: Option<usize>,

    /// Sample rate requested from the decoder
    #[arg(long, default_value_t = 8000)]
    sample_rate: u32,

    /// Audio extensions to include, comma separated
    #[arg(long, value_delimiter = ',', value_name = "EXT")]
    ext: Vec<String>,

    /// Path to the ffmpeg binary
    #[arg(long, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    /// Print the effective configuration as JSON before running
    #[arg(long)]
    dump_config: bool,
}

impl FingerprintArgs {
    fn to_config(&self) -> DedupConfig {
        let defaults = DedupConfig::default();
        DedupConfig {
            bits: self.bits,
            threshold: self.threshold,
            window_secs: self.seconds,
            concurrency: self.workers.unwrap_or(defaults.concurrency),
            sample_rate: self.sample_rate,
            extensions: if self.ext.is_empty() {
                defaults.extensions
            } else {
                self.ext.clone()
            },
        }
    }
}

#[derive(Subcommand, Debug)]
enum Dups {
    /// Find and list duplicate groups
    Scan {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,

        #[command(flatten)]
        fingerprint: FingerprintArgs,
    },

    /// Copy one file per duplicate group into a destination and write a CSV report
    Copy {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Directory that receives the kept files
        #[arg(short, long, value_name = "DIR")]
        dest: PathBuf,
        /// Report file (default: `audio_dedup_report_<timestamp>.csv`)
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        #[command(flatten)]
        fingerprint: FingerprintArgs,
    },

    /// Move duplicates into `<dir>/duplicates`
    Cull {
        /// Directory to cull
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Only show what would be moved
        #[arg(long)]
        dry_run: bool,
        /// Directory to move duplicates into (default: `<dir>/duplicates`)
        #[arg(long, value_name = "DIR")]
        target_dir: Option<PathBuf>,

        #[command(flatten)]
        fingerprint: FingerprintArgs,
    },

    /// Permanently delete duplicate audio files
    Delete {
        /// Directory to cull
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,

        #[command(flatten)]
        fingerprint: FingerprintArgs,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List all cull history records
    List {
        /// Directory containing the audio files
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
    },

    /// Move culled files back from the duplicates directory
    Restore {
        /// Directory containing the audio files
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Restore a specific record index
        #[arg(long, conflicts_with = "all")]
        record: Option<usize>,
        /// Restore all records
        #[arg(long, conflicts_with = "record")]
        all: bool,
        /// Where files were moved when the record does not say (default: `<dir>/duplicates`)
        #[arg(long, value_name = "DIR")]
        target_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match cli.command {
        Commands::Duplicates { command } => match command {
            Dups::Scan { path, fingerprint } => {
                println!("▶ Scanning for duplicate audio in: {}", path.display());
                let groups = find_duplicates(&path, &fingerprint, None)?;
                let dupes: Vec<&DuplicateGroup> =
                    groups.iter().filter(|g| !g.is_singleton()).collect();
                if dupes.is_empty() {
                    println!("No duplicates found.");
                } else {
                    println!("Found {} duplicate group(s):", dupes.len());
                    for (i, group) in dupes.iter().enumerate() {
                        println!(" Group {}:", i + 1);
                        println!(
                            "   🏆 {} ({} bytes)",
                            group.keep.path.display(),
                            group.keep.size
                        );
                        for dup in &group.duplicates {
                            println!("   ▶ {} ({} bytes)", dup.path.display(), dup.size);
                        }
                    }
                }
            }

            Dups::Copy {
                path,
                dest,
                report,
                fingerprint,
            } => {
                println!("▶ Copying unique audio from {} → {}", path.display(), dest.display());
                let start = Instant::now();
                let groups = find_duplicates(&path, &fingerprint, Some(&dest))?;
                fs::create_dir_all(&dest)
                    .with_context(|| format!("Failed to create directory {:?}", dest))?;

                let mut allocator = DestinationAllocator::new(&dest);
                let mut copied: HashMap<PathBuf, PathBuf> = HashMap::new();
                for group in &groups {
                    let src = &group.keep.path;
                    let target = match allocator.allocate(src) {
                        Ok(target) => target,
                        Err(err) => {
                            eprintln!("⚠️  {}", err);
                            continue;
                        }
                    };
                    match copy_file(src, &target) {
                        Ok(()) => {
                            log::debug!("Copied {} → {}", src.display(), target.display());
                            copied.insert(src.clone(), target);
                        }
                        Err(err) => eprintln!("⚠️  {}", err),
                    }
                }

                let items = report_items(&groups, |p| copied.get(p).cloned());
                let report_path =
                    report.unwrap_or_else(|| PathBuf::from(report_file_name(&Local::now())));
                write_csv_report_file(&report_path, &items)
                    .with_context(|| format!("Failed to write report {:?}", report_path))?;

                println!(
                    "✅ Kept {} of {} fingerprinted file(s), copied {} in {:.2?}",
                    groups.len(),
                    items.len(),
                    copied.len(),
                    start.elapsed()
                );
                println!("🧾 Report written to {}", report_path.display());
            }

            Dups::Cull {
                path,
                dry_run,
                target_dir,
                fingerprint,
            } => {
                println!("▶ Culling duplicates in: {}", path.display());
                let dup_dir = target_dir.unwrap_or_else(|| path.join("duplicates"));
                let groups = find_duplicates(&path, &fingerprint, Some(&dup_dir))?;
                let dupes: Vec<&DuplicateGroup> =
                    groups.iter().filter(|g| !g.is_singleton()).collect();
                if dupes.is_empty() {
                    println!("No duplicates found.");
                    return Ok(());
                }

                let mut history_out = if dry_run {
                    None
                } else {
                    fs::create_dir_all(&dup_dir)
                        .with_context(|| format!("Failed to create directory {:?}", dup_dir))?;
                    Some(HistoryWriter::open(&history::history_path(&path))?)
                };

                for (i, group) in dupes.iter().enumerate() {
                    println!("\n✨ Group {}:", i + 1);
                    println!("   🏆 Keeping → {}", group.keep.path.display());

                    let Some(out) = history_out.as_mut() else {
                        for dup in &group.duplicates {
                            let dest = keep_destination(&dup_dir, &dup.path)?;
                            println!(
                                "   📦 [dry-run] MOVE {} → {}",
                                dup.path.display(),
                                dest.display()
                            );
                        }
                        continue;
                    };

                    let outcome = cull::move_group(group, &dup_dir, out)?;
                    print_outcome(&outcome, "📦 Moved");
                }

                if dry_run {
                    println!("\n⚠️  Dry-run only; no files were changed.");
                } else {
                    println!(
                        "\n✅ Recorded cull history in {}",
                        history::history_path(&path).display()
                    );
                }
            }

            Dups::Delete {
                path,
                yes,
                fingerprint,
            } => {
                println!("▶ Deleting duplicates in: {}", path.display());
                let groups = find_duplicates(&path, &fingerprint, None)?;
                let dupes: Vec<&DuplicateGroup> =
                    groups.iter().filter(|g| !g.is_singleton()).collect();
                if dupes.is_empty() {
                    println!("No duplicates found.");
                    return Ok(());
                }

                let total: usize = dupes.iter().map(|g| g.duplicates.len()).sum();
                if !yes
                    && !Confirm::new()
                        .with_prompt(format!(
                            "Permanently delete {} file(s) from {} group(s)?",
                            total,
                            dupes.len()
                        ))
                        .default(false)
                        .interact()?
                {
                    println!("Aborted; no files were changed.");
                    return Ok(());
                }

                let mut history_out = HistoryWriter::open(&history::history_path(&path))?;
                for (i, group) in dupes.iter().enumerate() {
                    println!("\n✨ Group {}:", i + 1);
                    println!("   🏆 Keeping → {}", group.keep.path.display());
                    let outcome = cull::delete_group(group, &mut history_out)?;
                    print_outcome(&outcome, "🗑️  Deleted");
                }

                println!(
                    "\n✅ Recorded cull history in {}",
                    history::history_path(&path).display()
                );
            }
        },

        Commands::History { command } => match command {
            HistoryCmd::List { path } => {
                let entries = history::load(&history::history_path(&path))?;

                println!("🗂️  Cull History:");
                for (i, entry) in entries.iter().enumerate() {
                    match &entry.record {
                        Ok(rec) => println!(
                            "[{}] {}\n     kept: {}\n     culled: {:?}\n     action: {}\n",
                            i, rec.timestamp, rec.retained, rec.culled, rec.action
                        ),
                        Err(err) => eprintln!("⚠️  Skipping malformed entry {}: {}", i, err),
                    }
                }
            }

            HistoryCmd::Restore {
                path,
                record,
                all,
                target_dir,
            } => {
                let selection = match (all, record) {
                    (true, _) => RestoreSelection::All,
                    (false, Some(index)) => RestoreSelection::Index(index),
                    (false, None) => RestoreSelection::Latest,
                };
                let default_dir = target_dir.unwrap_or_else(|| path.join("duplicates"));
                let outcome = history::restore(&path, &default_dir, selection)?;

                for restored in &outcome.restored {
                    println!("🔄 Restored {}", restored.display());
                }
                for skipped in &outcome.skipped {
                    eprintln!("⚠️  Could not restore {}; skipping", skipped.display());
                }
                println!(
                    "🧹 Updated history, removed {} record(s)",
                    outcome.records
                );
            }
        },
    }

    Ok(())
}

/// Scan `dir` for audio, fingerprint every file in parallel and group the
/// results. Files under `exclude` (e.g. an output directory inside `dir`) are
/// ignored.
fn find_duplicates(
    dir: &Path,
    args: &FingerprintArgs,
    exclude: Option<&Path>,
) -> Result<Vec<DuplicateGroup>> {
    let config = args.to_config();
    config.validate()?;
    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }

    let decoder = FfmpegDecoder::locate(config.sample_rate, args.ffmpeg.as_deref())?;

    let mut files = scan_directory_with_progress(dir, &config.extensions, &ProgressBar::new_spinner())?;
    if let Some(excluded) = exclude {
        files.retain(|p| !p.starts_with(excluded));
    }
    if files.is_empty() {
        anyhow::bail!("No supported audio files found in {}", dir.display());
    }
    println!("▶ Parallel fingerprinting {} files…", files.len());

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] {msg}",
    )?);
    let options = RunOptions::from(&config);
    let result = benchmark("fingerprinting all files", || {
        run_with_progress(&files, &options, &decoder, &bar)
    });
    bar.finish_and_clear();

    let batch = match result {
        Ok(batch) => batch,
        Err(DedupError::EmptyBatch {
            attempted,
            failures,
        }) => {
            for failure in &failures {
                eprintln!("⚠️  {}", failure);
            }
            anyhow::bail!("No files could be fingerprinted (0 of {} succeeded)", attempted);
        }
        Err(err) => return Err(err.into()),
    };

    for failure in &batch.failures {
        eprintln!("⚠️  {}", failure);
    }
    println!("▶ {}", batch.summary());

    Ok(benchmark("grouping duplicates", || {
        group_duplicates(&batch.records, config.threshold)
    }))
}

fn print_outcome(outcome: &CullOutcome, verb: &str) {
    for path in &outcome.culled {
        println!("   {} {}", verb, path.display());
    }
    for path in &outcome.skipped {
        eprintln!("   ⚠️  Left {} in place; its name is already taken", path.display());
    }
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
