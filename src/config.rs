// Run configuration shared by every fingerprinting command.
//
// Fingerprints are only comparable when produced with the same width and
// decode parameters, so a single `DedupConfig` governs a whole run.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MAX_BITS: usize = 64;

pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "m4a", "ogg"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Fingerprint width in bits (1..=64)
    pub bits: usize,

    /// Maximum Hamming distance for two files to count as duplicates
    pub threshold: u32,

    /// Seconds decoded from the start of each file
    pub window_secs: u32,

    /// Parallel decode workers
    pub concurrency: usize,

    /// Mono sample rate requested from the decoder
    pub sample_rate: u32,

    /// Lowercase file extensions considered audio, without the dot
    pub extensions: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            bits: MAX_BITS,
            threshold: 8,
            window_secs: 8,
            concurrency: num_cpus::get().max(1),
            sample_rate: 8000,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bits(self.bits)?;
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.window_secs == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        Ok(())
    }
}

pub fn validate_bits(bits: usize) -> Result<(), ConfigError> {
    if bits == 0 || bits > MAX_BITS {
        return Err(ConfigError::InvalidBits { bits });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DedupConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bits, 64);
        assert_eq!(config.threshold, 8);
        assert_eq!(config.window_secs, 8);
        assert_eq!(config.sample_rate, 8000);
        assert!(config.concurrency >= 1);
    }

    #[test]
    fn rejects_out_of_range_bits() {
        for bits in [0, 65, 128] {
            let config = DedupConfig {
                bits,
                ..DedupConfig::default()
            };
            assert_eq!(config.validate(), Err(ConfigError::InvalidBits { bits }));
        }
        assert!(validate_bits(1).is_ok());
        assert!(validate_bits(64).is_ok());
    }

    #[test]
    fn rejects_zero_parameters() {
        let base = DedupConfig::default();
        let cases = [
            (
                DedupConfig {
                    concurrency: 0,
                    ..base.clone()
                },
                ConfigError::ZeroConcurrency,
            ),
            (
                DedupConfig {
                    window_secs: 0,
                    ..base.clone()
                },
                ConfigError::ZeroWindow,
            ),
            (
                DedupConfig {
                    sample_rate: 0,
                    ..base.clone()
                },
                ConfigError::ZeroSampleRate,
            ),
            (
                DedupConfig {
                    extensions: Vec::new(),
                    ..base.clone()
                },
                ConfigError::NoExtensions,
            ),
        ];
        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected));
        }
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: DedupConfig = serde_json::from_str(r#"{"threshold": 3}"#).unwrap();
        assert_eq!(config.threshold, 3);
        assert_eq!(config.bits, 64);
        assert_eq!(config.extensions.len(), DEFAULT_EXTENSIONS.len());
    }
}
