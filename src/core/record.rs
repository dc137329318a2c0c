use std::path::PathBuf;

use crate::core::fingerprint::Fingerprint;

/// A successfully fingerprinted file. Identity is `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRecord {
    pub path: PathBuf,
    pub size: u64,
    pub fingerprint: Fingerprint,
}

impl AudioRecord {
    pub fn new(path: impl Into<PathBuf>, size: u64, fingerprint: Fingerprint) -> Self {
        Self {
            path: path.into(),
            size,
            fingerprint,
        }
    }
}
