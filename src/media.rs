//! External media tools (ffmpeg / ffprobe).
//!
//! Decryption and codec probing shell out to the ffmpeg suite. The
//! [`MediaTool`] trait keeps the download path testable without the
//! binaries installed.
//!
//! Install ffmpeg:
//! - Windows: `winget install Gyan.FFmpeg`
//! - macOS: `brew install ffmpeg`
//! - Linux: `apt install ffmpeg` or equivalent

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::ToolsConfig;

/// Common installation paths for ffmpeg on Windows
#[cfg(windows)]
const FFMPEG_PATHS: &[&str] = &[
    "ffmpeg", // In PATH
    r"C:\ffmpeg\bin\ffmpeg.exe",
    r"C:\Program Files\ffmpeg\bin\ffmpeg.exe",
];

#[cfg(not(windows))]
const FFMPEG_PATHS: &[&str] = &[
    "ffmpeg", // In PATH
    "/usr/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/opt/homebrew/bin/ffmpeg",
];

#[cfg(windows)]
const FFPROBE_PATHS: &[&str] = &[
    "ffprobe",
    r"C:\ffmpeg\bin\ffprobe.exe",
    r"C:\Program Files\ffmpeg\bin\ffprobe.exe",
];

#[cfg(not(windows))]
const FFPROBE_PATHS: &[&str] = &[
    "ffprobe",
    "/usr/bin/ffprobe",
    "/usr/local/bin/ffprobe",
    "/opt/homebrew/bin/ffprobe",
];

/// Media tool errors
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("{0} not found. Please install FFmpeg: https://ffmpeg.org/download.html")]
    NotFound(&'static str),

    #[error("Failed to run {tool}: {message}")]
    Spawn { tool: &'static str, message: String },

    #[error("{tool} failed: {stderr}")]
    Failed { tool: &'static str, stderr: String },

    #[error("{0} produced no output")]
    EmptyOutput(PathBuf),
}

/// Decrypt and probe capability.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Codec name of the first audio stream (e.g. `flac`, `aac`).
    async fn probe_codec(&self, input: &Path) -> Result<String, MediaError>;

    /// Decrypt `input` with `key`, copying streams into `output`.
    async fn decrypt(&self, input: &Path, key: &str, output: &Path) -> Result<(), MediaError>;
}

/// ffmpeg/ffprobe invoked as child processes.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
}

impl Ffmpeg {
    /// Use configured paths, falling back to a search of the usual locations.
    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone().or_else(|| find_tool(FFMPEG_PATHS)),
            ffprobe: tools.ffprobe.clone().or_else(|| find_tool(FFPROBE_PATHS)),
        }
    }

    pub fn ffmpeg_path(&self) -> Option<&Path> {
        self.ffmpeg.as_deref()
    }

    pub fn ffprobe_path(&self) -> Option<&Path> {
        self.ffprobe.as_deref()
    }
}

/// First candidate that answers `-version`.
fn find_tool(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|path| {
            Command::new(path)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
        .map(PathBuf::from)
}

async fn run(
    tool: &'static str,
    program: &Path,
    args: &[&OsStr],
) -> Result<String, MediaError> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| MediaError::Spawn {
            tool,
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::Failed {
            tool,
            stderr: stderr.trim().lines().last().unwrap_or("").to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl MediaTool for Ffmpeg {
    async fn probe_codec(&self, input: &Path) -> Result<String, MediaError> {
        let ffprobe = self.ffprobe.as_deref().ok_or(MediaError::NotFound("ffprobe"))?;
        let stdout = run(
            "ffprobe",
            ffprobe,
            &[
                OsStr::new("-v"),
                OsStr::new("quiet"),
                OsStr::new("-select_streams"),
                OsStr::new("a:0"),
                OsStr::new("-show_entries"),
                OsStr::new("stream=codec_name"),
                OsStr::new("-of"),
                OsStr::new("default=noprint_wrappers=1:nokey=1"),
                input.as_os_str(),
            ],
        )
        .await?;
        Ok(stdout.trim().to_lowercase())
    }

    async fn decrypt(&self, input: &Path, key: &str, output: &Path) -> Result<(), MediaError> {
        let ffmpeg = self.ffmpeg.as_deref().ok_or(MediaError::NotFound("ffmpeg"))?;
        run(
            "ffmpeg",
            ffmpeg,
            &[
                OsStr::new("-y"),
                OsStr::new("-v"),
                OsStr::new("error"),
                OsStr::new("-decryption_key"),
                OsStr::new(key),
                OsStr::new("-i"),
                input.as_os_str(),
                OsStr::new("-c"),
                OsStr::new("copy"),
                output.as_os_str(),
            ],
        )
        .await?;

        let size = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(MediaError::EmptyOutput(output.to_path_buf()));
        }
        Ok(())
    }
}
