use std::path::Path;
use std::process::Command;

use tracing::{info, warn};

use crate::encode::backend::EncodeArtifact;
use crate::encode::ffmpeg::{is_ffprobe_on_path, remove_partial};
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Default lower bound on a valid artifact, in bytes.
pub const DEFAULT_MIN_ARTIFACT_BYTES: u64 = 1024;

/// Reject an artifact that is missing or smaller than `min_bytes`.
///
/// An undersized file is deleted: transcoders can exit successfully while writing only a header.
pub fn check_artifact_size(path: &Path, min_bytes: u64) -> StoryreelResult<u64> {
    let size = std::fs::metadata(path)
        .map_err(|e| {
            StoryreelError::mux(format!("artifact '{}' is missing: {e}", path.display()))
        })?
        .len();
    if size < min_bytes {
        remove_partial(path);
        return Err(StoryreelError::mux(format!(
            "artifact '{}' is {size} bytes, below the {min_bytes} byte minimum",
            path.display()
        )));
    }
    Ok(size)
}

/// Container duration in seconds as reported by `ffprobe`.
pub fn probe_duration_secs(path: &Path) -> StoryreelResult<f64> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .map_err(|e| StoryreelError::mux(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(StoryreelError::mux(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_probe_duration(&String::from_utf8_lossy(&out.stdout))
}

fn parse_probe_duration(stdout: &str) -> StoryreelResult<f64> {
    let text = stdout.trim();
    text.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| StoryreelError::mux(format!("ffprobe returned no duration: '{text}'")))
}

/// Size-check `path` and probe its duration when `ffprobe` is available.
pub fn finalize_artifact(path: &Path, min_bytes: u64) -> StoryreelResult<EncodeArtifact> {
    let byte_size = check_artifact_size(path, min_bytes)?;
    let probed_duration_secs = if is_ffprobe_on_path() {
        match probe_duration_secs(path) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!(error = %e, "artifact duration probe failed");
                None
            }
        }
    } else {
        None
    };
    info!(
        path = %path.display(),
        bytes = byte_size,
        duration = ?probed_duration_secs,
        "artifact ready"
    );
    Ok(EncodeArtifact {
        path: path.to_path_buf(),
        byte_size,
        probed_duration_secs,
    })
}
