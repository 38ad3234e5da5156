use crate::api::youtube::{ProgressFn, UploadError, VideoMetadata, VideoPlatform, watch_url};
use crate::{loge, logi, logok};
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use walkdir::WalkDir;

pub const VIDEO_EXTENSION: &str = "mp4";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedVideo {
    pub path: PathBuf,
    pub id: String,
    pub url: String,
}

#[derive(Debug)]
pub struct FailedUpload {
    pub path: PathBuf,
    pub error: UploadError,
}

#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedVideo>,
    pub failed: Vec<FailedUpload>,
}

/// Video files in `dir`, in file-name order.
pub fn list_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_video = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| ext.eq_ignore_ascii_case(VIDEO_EXTENSION))
            .unwrap_or(false);
        if is_video {
            out.push(path.to_path_buf());
        }
    }
    Ok(out)
}

/// Rounded percentage, clamped to 0..=100. An empty file counts as done.
pub fn percent(read: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    ((read as f64 / total as f64) * 100.0).round().min(100.0) as u64
}

/// Logs each whole-percent step once.
fn progress_logger() -> ProgressFn {
    let last = Arc::new(AtomicU64::new(u64::MAX));
    Arc::new(move |read: u64, total: u64| {
        let pct = percent(read, total);
        if last.swap(pct, Ordering::Relaxed) != pct {
            logi(format!("> {} % completed", pct));
        }
    })
}

fn video_title(path: &Path) -> String {
    path.file_stem()
        .and_then(OsStr::to_str)
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

async fn upload_one(platform: &dyn VideoPlatform, path: &Path) -> Result<UploadedVideo, UploadError> {
    let metadata = VideoMetadata::unlisted(video_title(path));
    let id = platform
        .insert_video(path, &metadata, progress_logger())
        .await?;
    let url = watch_url(&id);
    logok(format!(
        "Upload finished! - at {} \nVideo available at: {}",
        chrono::Utc::now().to_rfc2822(),
        url
    ));
    Ok(UploadedVideo {
        path: path.to_path_buf(),
        id,
        url,
    })
}

/// Uploads every video in `dir` one at a time, waiting `delay` between
/// uploads. A failed upload is logged and the rest still run.
pub async fn upload_all(
    platform: &dyn VideoPlatform,
    dir: &Path,
    delay: Duration,
) -> Result<UploadReport> {
    let videos = list_videos(dir)?;
    logi(format!(
        "Starting Video Uploads: {} files in {}",
        videos.len(),
        dir.display()
    ));

    let mut report = UploadReport::default();
    for (idx, path) in videos.iter().enumerate() {
        if idx > 0 {
            tokio::time::sleep(delay).await;
        }

        logi(format!("Uploading {}", path.display()));
        match upload_one(platform, path).await {
            Ok(video) => report.uploaded.push(video),
            Err(error) => {
                loge(format!("Upload failed for {}: {}", path.display(), error));
                report.failed.push(FailedUpload {
                    path: path.clone(),
                    error,
                });
            }
        }
    }

    logi(format!(
        "Uploads done. Uploaded: {}, failed: {}",
        report.uploaded.len(),
        report.failed.len()
    ));
    Ok(report)
}
