use async_trait::async_trait;
use narrated_uploads::api::youtube::{ProgressFn, UploadError, VideoMetadata, VideoPlatform};
use narrated_uploads::uploader;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct Call {
    path: PathBuf,
    title: String,
    privacy: String,
    at: Instant,
}

/// Reports progress in two steps and answers with an id derived from the
/// title; titles listed in `reject` fail.
#[derive(Default)]
struct FakePlatform {
    calls: Mutex<Vec<Call>>,
    reject: Vec<&'static str>,
}

#[async_trait]
impl VideoPlatform for FakePlatform {
    async fn insert_video(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
        progress: ProgressFn,
    ) -> Result<String, UploadError> {
        self.calls.lock().unwrap().push(Call {
            path: path.to_path_buf(),
            title: metadata.snippet.title.clone(),
            privacy: metadata.status.privacy_status.clone(),
            at: Instant::now(),
        });
        if self.reject.iter().any(|r| *r == metadata.snippet.title) {
            return Err(UploadError::Api {
                status: 403,
                body: "quotaExceeded".into(),
            });
        }
        progress(50, 100);
        progress(100, 100);
        Ok(format!("id-{}", metadata.snippet.title))
    }
}

fn video_dir(names: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), b"\x00\x00\x00\x18ftypmp42").unwrap();
    }
    dir
}

#[tokio::test(start_paused = true)]
async fn uploads_run_in_name_order_with_delay() {
    let dir = video_dir(&["b.mp4", "a.mp4", "a.png"]);
    let platform = FakePlatform::default();

    let report = uploader::upload_all(&platform, dir.path(), Duration::from_secs(5))
        .await
        .unwrap();

    let calls = platform.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].path, dir.path().join("a.mp4"));
    assert_eq!(calls[1].path, dir.path().join("b.mp4"));
    assert_eq!(calls[0].title, "a");
    assert!(calls.iter().all(|c| c.privacy == "unlisted"));
    assert!(calls[1].at.duration_since(calls[0].at) >= Duration::from_secs(5));

    let urls: Vec<&str> = report.uploaded.iter().map(|v| v.url.as_str()).collect();
    assert_eq!(urls, vec!["https://youtu.be/id-a", "https://youtu.be/id-b"]);
}

#[tokio::test(start_paused = true)]
async fn failed_upload_does_not_stop_the_rest() {
    let dir = video_dir(&["a.mp4", "b.mp4", "c.mp4"]);
    let platform = FakePlatform {
        reject: vec!["b"],
        ..FakePlatform::default()
    };

    let report = uploader::upload_all(&platform, dir.path(), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(platform.calls.lock().unwrap().len(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, dir.path().join("b.mp4"));
    assert!(matches!(
        report.failed[0].error,
        UploadError::Api { status: 403, .. }
    ));
    let ids: Vec<&str> = report.uploaded.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["id-a", "id-c"]);
}

#[tokio::test(start_paused = true)]
async fn empty_directory_uploads_nothing() {
    let dir = video_dir(&[]);
    let platform = FakePlatform::default();
    let report = uploader::upload_all(&platform, dir.path(), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(report.uploaded.is_empty());
    assert!(platform.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_directory_is_an_error() {
    let platform = FakePlatform::default();
    let result =
        uploader::upload_all(&platform, Path::new("/nonexistent/videos"), Duration::ZERO).await;
    assert!(result.is_err());
}
