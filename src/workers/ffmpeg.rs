use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::modules::media::intake::rendition_path;
use crate::modules::media::model::Rendition;

// Diagnostic lines kept for the failure log.
const STDERR_TAIL: usize = 12;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("transcoder exited with code {0:?}")]
    ExitCode(Option<i32>),

    #[error("transcoder I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcoder timed out after {0:?}")]
    TimedOut(Duration),
}

/// Converts a local video into one rendition, returning the local output path.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn convert(&self, input: &Path, rendition: &Rendition) -> Result<PathBuf, TranscodeError>;
}

#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    binary: String,
    timeout: Option<Duration>,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Scales to `height` keeping the aspect ratio (width rounded to an even number).
    pub fn args(input: &Path, output: &Path, height: u32) -> Vec<OsString> {
        let scale = format!("scale=-2:{}", height);
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into()];
        for arg in [
            "-vf",
            scale.as_str(),
            "-c:v",
            "libx264",
            "-crf",
            "23",
            "-preset",
            "medium",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
        ] {
            args.push(arg.into());
        }
        args.push(output.into());
        args
    }

    /// Logs a warning when the binary cannot be run.
    pub async fn check_available(&self) -> bool {
        let available = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false);

        if available {
            info!("🎥 Transcoder available: {}", self.binary);
        } else {
            warn!("Transcoder '{}' is not runnable, renditions will fail", self.binary);
        }
        available
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn convert(&self, input: &Path, rendition: &Rendition) -> Result<PathBuf, TranscodeError> {
        let output = rendition_path(input, &rendition.label);

        let mut child = Command::new(&self.binary)
            .args(Self::args(input, &output, rendition.height))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("transcoder stderr was not captured"))?;

        // Drain stderr while waiting, otherwise a full pipe blocks the child.
        let label = rendition.label.clone();
        let drain = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL);
            let mut lines = BufReader::new(stderr).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        debug!(target: "ffmpeg", rendition = %label, "{}", line);
                        if tail.len() == STDERR_TAIL {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(target: "ffmpeg", rendition = %label, "Failed to read diagnostics: {}", e);
                        break;
                    }
                }
            }
            tail
        });

        let status = match self.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => status?,
                    Err(_) => {
                        if let Err(e) = child.kill().await {
                            warn!("Failed to kill timed out transcoder: {}", e);
                        }
                        drain.abort();
                        return Err(TranscodeError::TimedOut(limit));
                    }
                }
            }
            None => child.wait().await?,
        };

        let tail = drain.await.unwrap_or_else(|e| {
            warn!("Diagnostics reader ended abnormally: {}", e);
            VecDeque::new()
        });

        if !status.success() {
            for line in &tail {
                error!(target: "ffmpeg", rendition = %rendition.label, "{}", line);
            }
            return Err(TranscodeError::ExitCode(status.code()));
        }

        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_transcoder(dir: &Path, body: &str) -> String {
        let script = dir.join("fake-ffmpeg.sh");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().into_owned()
    }

    #[test]
    fn argument_template_is_fixed() {
        let args = FfmpegTranscoder::args(Path::new("/s/in.mov"), Path::new("/s/720p-in.mp4"), 720);
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "-y", "-i", "/s/in.mov", "-vf", "scale=-2:720", "-c:v", "libx264", "-crf", "23",
                "-preset", "medium", "-c:a", "aac", "-b:a", "128k", "/s/720p-in.mp4",
            ]
        );
    }

    #[tokio::test]
    async fn drains_chatty_stderr_and_returns_output() {
        let dir = tempfile::tempdir().unwrap();
        // far more than a pipe buffer worth of diagnostics
        let binary = fake_transcoder(
            dir.path(),
            r#"i=0
while [ $i -lt 4000 ]; do echo "frame=$i fps=25 q=28.0 size=1024kB time=00:00:01.00 bitrate=8000kbits/s" >&2; i=$((i+1)); done
for last; do :; done
printf rendition > "$last""#,
        );
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"original").unwrap();

        let transcoder = FfmpegTranscoder::new(binary, Some(Duration::from_secs(30)));
        let output = transcoder
            .convert(&input, &Rendition::from_height(720))
            .await
            .unwrap();

        assert_eq!(output, dir.path().join("720p-in.mp4"));
        assert_eq!(std::fs::read(&output).unwrap(), b"rendition");
    }

    #[tokio::test]
    async fn non_zero_exit_is_exit_code_error() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_transcoder(dir.path(), "echo 'Invalid data found' >&2\nexit 3");
        let transcoder = FfmpegTranscoder::new(binary, None);

        let err = transcoder
            .convert(&dir.path().join("in.mp4"), &Rendition::from_height(1080))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::ExitCode(Some(3))));
    }

    #[tokio::test]
    async fn missing_binary_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new(dir.path().join("nope").to_string_lossy(), None);

        let err = transcoder
            .convert(&dir.path().join("in.mp4"), &Rendition::from_height(720))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Io(_)));
        assert!(!transcoder.check_available().await);
    }

    #[tokio::test]
    async fn hung_process_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_transcoder(dir.path(), "sleep 10");
        let transcoder = FfmpegTranscoder::new(binary, Some(Duration::from_millis(200)));

        let err = transcoder
            .convert(&dir.path().join("in.mp4"), &Rendition::from_height(720))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::TimedOut(_)));
    }
}
