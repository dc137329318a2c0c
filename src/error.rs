use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid run parameters. Always fatal to the call that received them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Fingerprint width must be within 1..=64 bits, got {bits}")]
    InvalidBits { bits: usize },

    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("Decode window must be at least 1 second")]
    ZeroWindow,

    #[error("Sample rate must be positive")]
    ZeroSampleRate,

    #[error("At least one audio extension is required")]
    NoExtensions,
}

/// Failure of the external decoder for a single file.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Decoder `{program}` not found; install it and make sure it is on PATH")]
    DecoderNotFound { program: String },

    #[error("Failed to run decoder: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Decoder failed: {message}")]
    Failed { message: String },

    #[error("Malformed PCM stream: {len} bytes is not a whole number of 16-bit samples")]
    MalformedPcm { len: usize },
}

/// Reason a single file could not be fingerprinted.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Could not read file metadata: {0}")]
    Metadata(#[source] std::io::Error),
}

/// A file that was attempted but excluded from the batch.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: FileError,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// Batch-level errors from the fingerprinting pipeline.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("No files could be fingerprinted ({} attempted, {} failed)", .attempted, .failures.len())]
    EmptyBatch {
        attempted: usize,
        failures: Vec<FileFailure>,
    },
}
