// External decoding to mono signed 16-bit PCM.
//
// The default backend shells out to `ffmpeg`, asking it for raw `s16le`
// samples at a fixed rate, truncated to the first `max_seconds` of the file.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::DecodeError;

/// Produces mono PCM samples covering at most `max_seconds` from the start of
/// a file. An empty vector means the file decoded to silence/nothing; real
/// failures are reported as `DecodeError`.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path, max_seconds: u32) -> Result<Vec<i16>, DecodeError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    program: PathBuf,
    sample_rate: u32,
}

impl FfmpegDecoder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            sample_rate,
        }
    }

    /// Use a specific ffmpeg binary instead of the one on PATH.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Build a decoder for `program` (or `ffmpeg` on PATH) and check once
    /// that the binary actually runs.
    pub fn locate(sample_rate: u32, program: Option<&Path>) -> Result<Self, DecodeError> {
        let decoder = match program {
            Some(program) => Self::new(sample_rate).with_program(program),
            None => Self::new(sample_rate),
        };
        decoder.ensure_available()?;
        Ok(decoder)
    }

    pub fn ensure_available(&self) -> Result<(), DecodeError> {
        let ok = Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if ok {
            log::debug!("Using decoder {}", self.program.display());
            Ok(())
        } else {
            Err(self.not_found())
        }
    }

    fn not_found(&self) -> DecodeError {
        DecodeError::DecoderNotFound {
            program: self.program.display().to_string(),
        }
    }

    fn args(&self, path: &Path, max_seconds: u32) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-v", "error", "-i"].iter().map(OsString::from).collect();
        args.push(path.as_os_str().to_owned());
        for arg in [
            "-f".to_string(),
            "s16le".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-t".to_string(),
            max_seconds.to_string(),
            "-".to_string(),
        ] {
            args.push(OsString::from(arg));
        }
        args
    }
}

impl Decoder for FfmpegDecoder {
    fn decode(&self, path: &Path, max_seconds: u32) -> Result<Vec<i16>, DecodeError> {
        let output = Command::new(&self.program)
            .args(self.args(path, max_seconds))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => self.not_found(),
                _ => DecodeError::Spawn(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("{} exited with {}", self.program.display(), output.status),
                msg => msg.to_string(),
            };
            return Err(DecodeError::Failed { message });
        }

        parse_s16le(&output.stdout)
    }
}

/// Interpret raw bytes as little-endian signed 16-bit samples.
pub fn parse_s16le(bytes: &[u8]) -> Result<Vec<i16>, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::MalformedPcm { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}
