// Append-only JSON-lines log of cull operations, kept next to the collection
// as `.history.jsonl`, so moved duplicates can be restored later.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HISTORY_FILE: &str = ".history.jsonl";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Could not access history file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Failed to serialize history record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No 'moved' history records to restore")]
    NothingToRestore,

    #[error("Invalid history index {index}; valid range is 0..={max}")]
    InvalidIndex { index: usize, max: usize },

    #[error("Failed to restore {from} to {to}: {source}")]
    Restore {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CullAction {
    Moved,
    Deleted,
}

impl std::fmt::Display for CullAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CullAction::Moved => write!(f, "moved"),
            CullAction::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CullHistoryRecord {
    pub timestamp: String,
    pub retained: String,
    pub culled: Vec<String>,
    pub action: CullAction,
    /// Directory the culled files were moved into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to: Option<String>,
}

impl CullHistoryRecord {
    pub fn new(retained: &Path, culled: &[PathBuf], action: CullAction) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            retained: retained.to_string_lossy().into_owned(),
            culled: culled
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            action,
            moved_to: None,
        }
    }

    pub fn moved_to(mut self, dir: &Path) -> Self {
        self.moved_to = Some(dir.to_string_lossy().into_owned());
        self
    }
}

/// A raw history line and its parsed record, if it parsed.
#[derive(Debug)]
pub struct HistoryEntry {
    pub line: String,
    pub record: Result<CullHistoryRecord, serde_json::Error>,
}

pub fn history_path(dir: &Path) -> PathBuf {
    dir.join(HISTORY_FILE)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> HistoryError + '_ {
    move |source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Appends records to a history file, creating it on first use.
pub struct HistoryWriter {
    path: PathBuf,
    file: File,
}

impl HistoryWriter {
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_error(path))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn append(&mut self, record: &CullHistoryRecord) -> Result<(), HistoryError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.file, "{}", line).map_err(io_error(&self.path))
    }
}

pub fn load(path: &Path) -> Result<Vec<HistoryEntry>, HistoryError> {
    let file = File::open(path).map_err(io_error(path))?;
    BufReader::new(file)
        .lines()
        .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
        .map(|line| -> Result<HistoryEntry, HistoryError> {
            let line = line.map_err(io_error(path))?;
            let record = serde_json::from_str(&line);
            Ok(HistoryEntry { line, record })
        })
        .collect()
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub records: usize,
    pub restored: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Which "moved" records to undo. `Latest` picks the most recent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSelection {
    Latest,
    Index(usize),
    All,
}

/// Move culled files of the selected "moved" records back to their original
/// locations and drop those records from the history. Indices count only
/// "moved" records. Files whose source is missing are skipped.
pub fn restore(
    dir: &Path,
    default_moved_to: &Path,
    selection: RestoreSelection,
) -> Result<RestoreOutcome, HistoryError> {
    let path = history_path(dir);
    let entries = load(&path)?;

    let movable: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(&e.record, Ok(r) if r.action == CullAction::Moved))
        .map(|(i, _)| i)
        .collect();
    if movable.is_empty() {
        return Err(HistoryError::NothingToRestore);
    }

    let chosen: Vec<usize> = match selection {
        RestoreSelection::All => movable.clone(),
        RestoreSelection::Latest => vec![movable[movable.len() - 1]],
        RestoreSelection::Index(index) => match movable.get(index) {
            Some(&i) => vec![i],
            None => {
                return Err(HistoryError::InvalidIndex {
                    index,
                    max: movable.len() - 1,
                });
            }
        },
    };

    let mut outcome = RestoreOutcome {
        records: chosen.len(),
        ..RestoreOutcome::default()
    };
    for &i in &chosen {
        let Ok(record) = &entries[i].record else {
            continue;
        };
        let source_dir = record
            .moved_to
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_moved_to.to_path_buf());
        log::info!(
            "Restoring {} file(s) from record {}",
            record.culled.len(),
            record.timestamp
        );
        for original in &record.culled {
            let dest = PathBuf::from(original);
            let Some(name) = dest.file_name().map(|n| n.to_owned()) else {
                outcome.skipped.push(dest);
                continue;
            };
            let src = source_dir.join(name);
            if !src.exists() || src == dest {
                log::warn!("Cannot restore {}; skipping", src.display());
                outcome.skipped.push(dest);
                continue;
            }
            fs::rename(&src, &dest).map_err(|source| HistoryError::Restore {
                from: src.clone(),
                to: dest.clone(),
                source,
            })?;
            outcome.restored.push(dest);
        }
    }

    let remaining: String = entries
        .iter()
        .enumerate()
        .filter(|(i, _)| !chosen.contains(i))
        .map(|(_, e)| format!("{}\n", e.line))
        .collect();
    fs::write(&path, remaining).map_err(io_error(&path))?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_serializes_like_history_lines() {
        let record = CullHistoryRecord {
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            retained: "a.flac".to_string(),
            culled: vec!["b.mp3".to_string()],
            action: CullAction::Moved,
            moved_to: None,
        };
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"timestamp":"2024-01-01T00:00:00+00:00","retained":"a.flac","culled":["b.mp3"],"action":"moved"}"#
        );
    }

    #[test]
    fn append_then_load_keeps_malformed_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = history_path(temp_dir.path());

        let mut writer = HistoryWriter::open(&path).unwrap();
        writer
            .append(&CullHistoryRecord::new(
                Path::new("keep.flac"),
                &[PathBuf::from("dup.mp3")],
                CullAction::Deleted,
            ))
            .unwrap();
        drop(writer);
        let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(raw, "not json").unwrap();

        let entries = load(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].record.as_ref().unwrap().action, CullAction::Deleted);
        assert!(entries[1].record.is_err());
    }

    fn cull_fixture(temp_dir: &TempDir, names: &[&str]) -> PathBuf {
        let dup_dir = temp_dir.path().join("duplicates");
        fs::create_dir_all(&dup_dir).unwrap();
        let culled: Vec<PathBuf> = names.iter().map(|n| temp_dir.path().join(n)).collect();
        for name in names {
            fs::write(dup_dir.join(name), name.as_bytes()).unwrap();
        }
        let mut writer = HistoryWriter::open(&history_path(temp_dir.path())).unwrap();
        writer
            .append(
                &CullHistoryRecord::new(&temp_dir.path().join("keep.flac"), &culled, CullAction::Moved)
                    .moved_to(&dup_dir),
            )
            .unwrap();
        dup_dir
    }

    #[test]
    fn restores_latest_moved_record() {
        let temp_dir = TempDir::new().unwrap();
        let dup_dir = cull_fixture(&temp_dir, &["a.mp3", "b.mp3"]);

        let outcome = restore(temp_dir.path(), &dup_dir, RestoreSelection::Latest).unwrap();

        assert_eq!(outcome.records, 1);
        assert_eq!(outcome.restored.len(), 2);
        assert!(temp_dir.path().join("a.mp3").exists());
        assert!(!dup_dir.join("b.mp3").exists());
        assert!(load(&history_path(temp_dir.path())).unwrap().is_empty());
    }

    #[test]
    fn missing_sources_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let dup_dir = cull_fixture(&temp_dir, &["a.mp3"]);
        fs::remove_file(dup_dir.join("a.mp3")).unwrap();

        let outcome = restore(temp_dir.path(), &dup_dir, RestoreSelection::All).unwrap();
        assert!(outcome.restored.is_empty());
        assert_eq!(outcome.skipped, vec![temp_dir.path().join("a.mp3")]);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let temp_dir = TempDir::new().unwrap();
        let dup_dir = cull_fixture(&temp_dir, &["a.mp3"]);
        assert!(matches!(
            restore(temp_dir.path(), &dup_dir, RestoreSelection::Index(3)),
            Err(HistoryError::InvalidIndex { index: 3, max: 0 })
        ));
    }

    #[test]
    fn deleted_only_history_has_nothing_to_restore() {
        let temp_dir = TempDir::new().unwrap();
        let path = history_path(temp_dir.path());
        HistoryWriter::open(&path)
            .unwrap()
            .append(&CullHistoryRecord::new(Path::new("k"), &[], CullAction::Deleted))
            .unwrap();
        assert!(matches!(
            restore(temp_dir.path(), temp_dir.path(), RestoreSelection::Latest),
            Err(HistoryError::NothingToRestore)
        ));
    }
}
