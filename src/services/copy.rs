use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Failed to move {from} into place at {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Source has no file name: {0}")]
    NoFileName(PathBuf),
}

/// Where a kept file lands inside `dest_dir`.
pub fn keep_destination(dest_dir: &Path, src: &Path) -> Result<PathBuf, CopyError> {
    let name = src
        .file_name()
        .ok_or_else(|| CopyError::NoFileName(src.to_path_buf()))?;
    Ok(dest_dir.join(name))
}

/// Hands out destinations inside one directory for a single run. Two sources
/// sharing a file name get `name.ext`, `name (1).ext`, `name (2).ext`, ...
/// so no keeper overwrites another.
#[derive(Debug)]
pub struct DestinationAllocator {
    dest_dir: PathBuf,
    claimed: HashSet<PathBuf>,
}

impl DestinationAllocator {
    pub fn new(dest_dir: &Path) -> Self {
        Self {
            dest_dir: dest_dir.to_path_buf(),
            claimed: HashSet::new(),
        }
    }

    pub fn allocate(&mut self, src: &Path) -> Result<PathBuf, CopyError> {
        let mut candidate = keep_destination(&self.dest_dir, src)?;
        let mut n = 1;
        while self.claimed.contains(&candidate) {
            candidate = self.dest_dir.join(numbered_name(src, n));
            n += 1;
        }
        self.claimed.insert(candidate.clone());
        Ok(candidate)
    }
}

fn numbered_name(src: &Path, n: usize) -> OsString {
    let mut name = src.file_stem().map(OsString::from).unwrap_or_default();
    name.push(format!(" ({n})"));
    if let Some(ext) = src.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Copy `src` to `dst` through a `<dst>.tmp` file and a rename, overwriting
/// any existing `dst`.
pub fn copy_file(src: &Path, dst: &Path) -> Result<(), CopyError> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CopyError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut tmp_name = dst.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    if let Err(source) = copy_contents(src, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(CopyError::Copy {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            source,
        });
    }

    if let Err(source) = fs::rename(&tmp, dst) {
        // Some platforms refuse to rename over an existing file
        if fs::remove_file(dst).is_ok() && fs::rename(&tmp, dst).is_ok() {
            return Ok(());
        }
        let _ = fs::remove_file(&tmp);
        return Err(CopyError::Rename {
            from: tmp,
            to: dst.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn copy_contents(src: &Path, tmp: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let mut output = File::create(tmp)?;
    io::copy(&mut input, &mut output)?;
    output.sync_all()
}
