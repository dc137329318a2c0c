// Bounded-concurrency decode + fingerprint pipeline.
//
// A fixed pool of worker threads drains a shared queue of paths. Each worker
// blocks on the external decoder, fingerprints the samples and sends the
// outcome over a many-producer channel to the collecting thread. One failing
// file never aborts the batch; only a batch with zero records is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::unbounded;
use indicatif::ProgressBar;

use crate::config::{DedupConfig, validate_bits};
use crate::core::decode::Decoder;
use crate::core::fingerprint::fingerprint;
use crate::core::record::AudioRecord;
use crate::error::{ConfigError, DedupError, FileError, FileFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub concurrency: usize,
    pub window_secs: u32,
    pub bits: usize,
}

impl RunOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bits(self.bits)?;
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.window_secs == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(())
    }
}

impl From<&DedupConfig> for RunOptions {
    fn from(config: &DedupConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            window_secs: config.window_secs,
            bits: config.bits,
        }
    }
}

/// Outcome of a run. `records` is in completion order, not input order.
#[derive(Debug, Default)]
pub struct Batch {
    pub attempted: usize,
    pub records: Vec<AudioRecord>,
    pub failures: Vec<FileFailure>,
}

impl Batch {
    pub fn summary(&self) -> String {
        format!(
            "fingerprinted {} of {} files ({} failed)",
            self.records.len(),
            self.attempted,
            self.failures.len()
        )
    }
}

/// Decode and fingerprint every path using `options.concurrency` workers.
pub fn run<D>(paths: &[PathBuf], options: &RunOptions, decoder: &D) -> Result<Batch, DedupError>
where
    D: Decoder + ?Sized,
{
    run_with_progress(paths, options, decoder, &ProgressBar::hidden())
}

/// Same as [`run`], advancing `progress` once per completed file.
pub fn run_with_progress<D>(
    paths: &[PathBuf],
    options: &RunOptions,
    decoder: &D,
    progress: &ProgressBar,
) -> Result<Batch, DedupError>
where
    D: Decoder + ?Sized,
{
    options.validate()?;

    let attempted = paths.len();
    let workers = options.concurrency.min(attempted).max(1);
    log::info!(
        "Fingerprinting {} file(s) with {} worker(s), {}s window, {} bits",
        attempted,
        workers,
        options.window_secs,
        options.bits
    );

    let (job_tx, job_rx) = unbounded::<&Path>();
    for path in paths {
        if job_tx.send(path.as_path()).is_err() {
            break;
        }
    }
    drop(job_tx);

    let (result_tx, result_rx) = unbounded::<(&Path, Result<AudioRecord, FileError>)>();
    let mut batch = Batch {
        attempted,
        ..Batch::default()
    };

    thread::scope(|scope| {
        for _ in 0..workers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            scope.spawn(move || {
                for path in jobs.iter() {
                    let outcome = fingerprint_file(path, options, decoder);
                    if results.send((path, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for (path, outcome) in result_rx.iter() {
            progress.inc(1);
            match outcome {
                Ok(record) => {
                    log::debug!(
                        "Fingerprinted {} (size={} fp={})",
                        path.display(),
                        record.size,
                        record.fingerprint.to_bit_string(options.bits)
                    );
                    batch.records.push(record);
                }
                Err(error) => {
                    log::warn!("Failed to process {}: {}", path.display(), error);
                    batch.failures.push(FileFailure {
                        path: path.to_path_buf(),
                        error,
                    });
                }
            }
        }
    });

    log::info!("Batch complete: {}", batch.summary());

    if batch.records.is_empty() {
        return Err(DedupError::EmptyBatch {
            attempted,
            failures: batch.failures,
        });
    }
    Ok(batch)
}

fn fingerprint_file<D>(path: &Path, options: &RunOptions, decoder: &D) -> Result<AudioRecord, FileError>
where
    D: Decoder + ?Sized,
{
    let size = fs::metadata(path).map_err(FileError::Metadata)?.len();
    let samples = decoder.decode(path, options.window_secs)?;
    if samples.is_empty() {
        log::debug!("{} decoded to no samples; fingerprint is unknown", path.display());
    }
    // Width was validated for the whole run before any worker started
    let fingerprint = fingerprint(&samples, options.bits).unwrap_or_default();
    Ok(AudioRecord {
        path: path.to_path_buf(),
        size,
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::Fingerprint;
    use crate::error::DecodeError;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Decodes by file name: names containing "bad" fail, the rest yield a
    /// ramp whose shape depends on the file contents' length.
    struct FakeDecoder {
        calls: AtomicUsize,
    }

    impl FakeDecoder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Decoder for FakeDecoder {
        fn decode(&self, path: &Path, max_seconds: u32) -> Result<Vec<i16>, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path.file_name().unwrap().to_string_lossy();
            if name.contains("bad") {
                return Err(DecodeError::Failed {
                    message: format!("cannot decode {name}"),
                });
            }
            if name.contains("silent") {
                return Ok(Vec::new());
            }
            let len = 100 * max_seconds as usize;
            Ok((0..len).map(|i| (i % 100) as i16 * 10).collect())
        }
    }

    fn options(concurrency: usize) -> RunOptions {
        RunOptions {
            concurrency,
            window_secs: 8,
            bits: 64,
        }
    }

    fn write_files(dir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn collects_records_and_failures() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["one.mp3", "bad.mp3", "three.flac"]);
        let decoder = FakeDecoder::new();

        let batch = run(&paths, &options(2), &decoder).unwrap();

        assert_eq!(batch.attempted, 3);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].path, paths[1]);
        assert!(matches!(batch.failures[0].error, FileError::Decode(_)));
        assert_eq!(batch.summary(), "fingerprinted 2 of 3 files (1 failed)");
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 3);

        let one = batch.records.iter().find(|r| r.path == paths[0]).unwrap();
        assert_eq!(one.size, "one.mp3".len() as u64);
    }

    #[test]
    fn all_failures_is_an_empty_batch_error() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["bad1.mp3", "bad2.mp3"]);

        match run(&paths, &options(4), &FakeDecoder::new()) {
            Err(DedupError::EmptyBatch { attempted, failures }) => {
                assert_eq!(attempted, 2);
                assert_eq!(failures.len(), 2);
            }
            other => panic!("expected EmptyBatch, got {:?}", other),
        }
    }

    #[test]
    fn no_paths_is_an_empty_batch_error() {
        assert!(matches!(
            run(&[], &options(1), &FakeDecoder::new()),
            Err(DedupError::EmptyBatch { attempted: 0, .. })
        ));
    }

    #[test]
    fn missing_file_is_a_metadata_failure() {
        let dir = TempDir::new().unwrap();
        let mut paths = write_files(&dir, &["ok.wav"]);
        paths.push(dir.path().join("gone.wav"));

        let batch = run(&paths, &options(2), &FakeDecoder::new()).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert!(matches!(batch.failures[0].error, FileError::Metadata(_)));
    }

    #[test]
    fn silent_file_gets_the_unknown_fingerprint() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["silent.wav"]);
        let batch = run(&paths, &options(1), &FakeDecoder::new()).unwrap();
        assert_eq!(batch.records[0].fingerprint, Fingerprint(0));
    }

    #[test]
    fn invalid_options_fail_before_decoding() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["one.mp3"]);
        let decoder = FakeDecoder::new();

        for bad in [
            RunOptions { bits: 0, ..options(1) },
            RunOptions { bits: 65, ..options(1) },
            RunOptions { concurrency: 0, ..options(1) },
            RunOptions { window_secs: 0, ..options(1) },
        ] {
            assert!(matches!(
                run(&paths, &bad, &decoder),
                Err(DedupError::Config(_))
            ));
        }
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn worker_count_does_not_change_results() {
        let dir = TempDir::new().unwrap();
        let names: Vec<String> = (0..20).map(|i| format!("track{i:02}.mp3")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let paths = write_files(&dir, &names);

        let collect = |concurrency| -> BTreeSet<(PathBuf, u64, u64)> {
            run(&paths, &options(concurrency), &FakeDecoder::new())
                .unwrap()
                .records
                .into_iter()
                .map(|r| (r.path, r.size, r.fingerprint.0))
                .collect()
        };
        let serial = collect(1);
        assert_eq!(serial.len(), 20);
        assert_eq!(serial, collect(8));
    }

    #[test]
    fn works_through_a_trait_object() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["one.mp3"]);
        let decoder: Box<dyn Decoder> = Box::new(FakeDecoder::new());
        let batch = run(&paths, &options(1), decoder.as_ref()).unwrap();
        assert_eq!(batch.records.len(), 1);
    }
}
