use crate::{logi, logw};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("FFmpeg process exited with code: {code}")]
    Exit { code: i32 },
    #[error("FFmpeg process was terminated by a signal")]
    Signal,
    #[error("FFmpeg process I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait VideoMuxer: Send + Sync {
    /// Combines a still image and an audio track into `output`.
    async fn mux(&self, image: &Path, audio: &Path, output: &Path) -> Result<(), MuxError>;
}

/// Loops the still for as long as the audio lasts, copies the audio stream
/// untouched and encodes the video as H.264.
pub fn still_image_args(image: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loop", "1", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(image.as_os_str().to_owned());
    args.push("-i".into());
    args.push(audio.as_os_str().to_owned());
    for arg in ["-c:v", "libx264", "-c:a", "copy", "-shortest"] {
        args.push(arg.into());
    }
    args.push(output.as_os_str().to_owned());
    args
}

const READ_BUF: usize = 8 * 1024;

/// Takes every complete segment out of `pending`. FFmpeg ends progress
/// updates with `\r` and everything else with `\n`, so both terminate one.
fn take_segments(pending: &mut Vec<u8>) -> Vec<String> {
    let Some(last) = pending.iter().rposition(|b| matches!(b, b'\r' | b'\n')) else {
        return Vec::new();
    };
    let rest = pending.split_off(last + 1);
    let done = std::mem::replace(pending, rest);
    done.split(|b| matches!(b, b'\r' | b'\n'))
        .map(|seg| String::from_utf8_lossy(seg).trim_end().to_string())
        .filter(|seg| !seg.trim().is_empty())
        .collect()
}

fn emit(segment: &str, is_stderr: bool) {
    if is_stderr {
        logw(segment);
    } else {
        logi(segment);
    }
}

/// Logs whatever the child writes until the pipe closes. Output is never
/// decoded strictly and a read failure only ends the logging.
async fn pump_output<R>(reader: Option<R>, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };
    let mut buf = vec![0u8; READ_BUF];
    let mut pending = Vec::new();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                for segment in take_segments(&mut pending) {
                    emit(&segment, is_stderr);
                }
            }
            Err(err) => {
                tracing::debug!("stopped reading FFmpeg output: {}", err);
                break;
            }
        }
    }
    let tail = String::from_utf8_lossy(&pending);
    if !tail.trim().is_empty() {
        emit(tail.trim_end(), is_stderr);
    }
}

/// Runs `program` with `args`, logging its output as it arrives, and maps
/// the exit status onto [`MuxError`].
pub async fn run_streaming(program: &Path, args: &[OsString]) -> Result<(), MuxError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| MuxError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let ((), (), status) = tokio::join!(
        pump_output(stdout, false),
        pump_output(stderr, true),
        child.wait()
    );
    let status = status?;

    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(MuxError::Exit { code }),
        None => Err(MuxError::Signal),
    }
}

pub struct FfmpegMuxer {
    program: PathBuf,
}

impl FfmpegMuxer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl VideoMuxer for FfmpegMuxer {
    async fn mux(&self, image: &Path, audio: &Path, output: &Path) -> Result<(), MuxError> {
        let args = still_image_args(image, audio, output);
        run_streaming(&self.program, &args).await
    }
}
