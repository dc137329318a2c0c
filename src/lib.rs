// Near-duplicate audio detection.
//
// Files are decoded to a short mono PCM window, reduced to a fixed-width
// block/median fingerprint, clustered by Hamming distance and reduced to one
// keeper per cluster.

pub mod config;
pub mod core;
pub mod error;
pub mod services;

pub use config::DedupConfig;
pub use crate::core::cluster::{DisjointSet, cluster};
pub use crate::core::decode::{Decoder, FfmpegDecoder};
pub use crate::core::duplicate::{DuplicateGroup, group_duplicates, select_keep};
pub use crate::core::fingerprint::{Fingerprint, distance, fingerprint};
pub use crate::core::orchestrator::{Batch, RunOptions, run, run_with_progress};
pub use crate::core::record::AudioRecord;
pub use error::{ConfigError, DecodeError, DedupError, FileError, FileFailure};
