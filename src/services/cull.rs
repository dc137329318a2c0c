// Moving or deleting the duplicates of one group. Whatever was already culled
// is written to the history before an error is returned, so a failure halfway
// through a group never loses track of files that left their folder.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::duplicate::DuplicateGroup;
use crate::services::copy::{CopyError, keep_destination};
use crate::services::history::{CullAction, CullHistoryRecord, HistoryError, HistoryWriter};

#[derive(Debug, Error)]
pub enum CullError {
    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Failed to delete {path}: {source}")]
    Delete { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Destination(#[from] CopyError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CullOutcome {
    /// Files moved or deleted, in group order
    pub culled: Vec<PathBuf>,
    /// Files left in place because their target name was already taken
    pub skipped: Vec<PathBuf>,
}

/// Move every duplicate of `group` into `dup_dir` and record it as "moved".
pub fn move_group(
    group: &DuplicateGroup,
    dup_dir: &Path,
    history: &mut HistoryWriter,
) -> Result<CullOutcome, CullError> {
    let mut outcome = CullOutcome::default();
    let mut failure = None;

    for dup in &group.duplicates {
        let dest = match keep_destination(dup_dir, &dup.path) {
            Ok(dest) => dest,
            Err(err) => {
                failure = Some(CullError::from(err));
                break;
            }
        };
        if dest.exists() {
            log::warn!(
                "{} already exists; leaving {} in place",
                dest.display(),
                dup.path.display()
            );
            outcome.skipped.push(dup.path.clone());
            continue;
        }
        if let Err(source) = fs::rename(&dup.path, &dest) {
            failure = Some(CullError::Move {
                from: dup.path.clone(),
                to: dest,
                source,
            });
            break;
        }
        outcome.culled.push(dup.path.clone());
    }

    let record = CullHistoryRecord::new(&group.keep.path, &outcome.culled, CullAction::Moved)
        .moved_to(dup_dir);
    finish(record, outcome, failure, history)
}

/// Delete every duplicate of `group` and record it as "deleted".
pub fn delete_group(
    group: &DuplicateGroup,
    history: &mut HistoryWriter,
) -> Result<CullOutcome, CullError> {
    let mut outcome = CullOutcome::default();
    let mut failure = None;

    for dup in &group.duplicates {
        if let Err(source) = fs::remove_file(&dup.path) {
            failure = Some(CullError::Delete {
                path: dup.path.clone(),
                source,
            });
            break;
        }
        outcome.culled.push(dup.path.clone());
    }

    let record = CullHistoryRecord::new(&group.keep.path, &outcome.culled, CullAction::Deleted);
    finish(record, outcome, failure, history)
}

fn finish(
    record: CullHistoryRecord,
    outcome: CullOutcome,
    failure: Option<CullError>,
    history: &mut HistoryWriter,
) -> Result<CullOutcome, CullError> {
    match failure {
        None => {
            history.append(&record)?;
            Ok(outcome)
        }
        Some(err) => {
            if !outcome.culled.is_empty() {
                if let Err(history_err) = history.append(&record) {
                    log::error!("Could not record partial cull: {}", history_err);
                }
            }
            Err(err)
        }
    }
}
