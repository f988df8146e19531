//! Media duration probing via ffprobe
//!
//! Durations feed the duplicate detector. Probing is strictly best-effort:
//! a missing binary, an unreadable file, bad JSON, or a probe that exceeds
//! the timeout all yield None and never fail the scan.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Duration prober wrapping the external ffprobe tool
#[derive(Debug, Clone)]
pub struct FfprobeService {
    ffprobe_path: String,
}

impl FfprobeService {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Probe the duration of a media file in seconds
    pub async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error"])
            .args(["-print_format", "json"])
            .arg("-show_format")
            .arg(path)
            .stdin(Stdio::null())
            .output();

        let output = match tokio::time::timeout(PROBE_TIMEOUT, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(path = %path.display(), error = %e, "ffprobe failed to execute");
                return None;
            }
            Err(_) => {
                debug!(path = %path.display(), "ffprobe timed out");
                return None;
            }
        };

        if !output.status.success() {
            debug!(
                path = %path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "ffprobe returned an error"
            );
            return None;
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout).ok()?;
        probe
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_yields_none() {
        let probe = FfprobeService::new("/nonexistent/ffprobe");
        assert!(probe
            .probe_duration(Path::new("/tmp/whatever.mkv"))
            .await
            .is_none());
    }
}
