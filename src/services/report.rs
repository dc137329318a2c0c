use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use thiserror::Error;

use crate::core::duplicate::DuplicateGroup;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One row of the dedup report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportItem {
    pub path: PathBuf,
    pub kept: bool,
    pub size: u64,
    /// Destination of a kept file, if it was copied
    pub new_path: Option<PathBuf>,
}

/// `audio_dedup_report_<YYYYmmdd_HHMMSS>.csv`
pub fn report_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("audio_dedup_report_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Report rows for every member of `groups`: keepers first within a group,
/// with the destination produced by `destination` for keepers.
pub fn report_items<F>(groups: &[DuplicateGroup], mut destination: F) -> Vec<ReportItem>
where
    F: FnMut(&Path) -> Option<PathBuf>,
{
    let mut items = Vec::new();
    for group in groups {
        items.push(ReportItem {
            path: group.keep.path.clone(),
            kept: true,
            size: group.keep.size,
            new_path: destination(&group.keep.path),
        });
        for dup in &group.duplicates {
            items.push(ReportItem {
                path: dup.path.clone(),
                kept: false,
                size: dup.size,
                new_path: None,
            });
        }
    }
    items
}

pub fn write_csv_report<W: Write>(out: W, items: &[ReportItem]) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["FilePath", "Kept", "Size", "NewPath"])?;
    for item in items {
        let new_path = item
            .new_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer.write_record([
            item.path.to_string_lossy().into_owned(),
            if item.kept { "Yes" } else { "No" }.to_string(),
            item.size.to_string(),
            new_path,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_csv_report_file(path: &Path, items: &[ReportItem]) -> Result<(), ReportError> {
    let file = std::fs::File::create(path)?;
    write_csv_report(file, items)?;
    log::info!("Wrote report with {} row(s) to {}", items.len(), path.display());
    Ok(())
}
