use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("Progress template error: {0}")]
    Template(#[from] indicatif::style::TemplateError),
}

/// Recursively walk `dir`, returning audio files whose extension (compared
/// case-insensitively, without the dot) is in `extensions`. Unreadable
/// entries are skipped. Output is sorted.
pub fn scan_directory(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, ScanError> {
    scan_directory_with_progress(dir, extensions, &ProgressBar::hidden())
}

pub fn scan_directory_with_progress(
    dir: &Path,
    extensions: &[String],
    spinner: &ProgressBar,
) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::InvalidPath {
            path: dir.to_string_lossy().into_owned(),
        });
    }

    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Scanning for audio files…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let allowed: HashSet<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                if allowed.contains(&ext.to_lowercase()) {
                    files.push(path.to_path_buf());
                }
            }
        }
        spinner.tick();
    }
    files.sort();

    spinner.finish_with_message(format!("Scan complete: {} audio file(s)", files.len()));
    log::info!("Found {} audio file(s) under {}", files.len(), dir.display());
    Ok(files)
}
