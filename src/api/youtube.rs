use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use reqwest::{Body, Client};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

pub const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=multipart&part=snippet,status";
pub const WATCH_BASE: &str = "https://youtu.be";

const BOUNDARY: &str = "narrated-uploads-7f3c9a1e5b";
const READ_CHUNK: usize = 256 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload rejected with HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("upload response had no video id")]
    MissingId,
}

/// Called with (bytes read so far, total bytes) as the media is streamed.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Snippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub privacy_status: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoMetadata {
    pub snippet: Snippet,
    pub status: Status,
}

impl VideoMetadata {
    /// Title only, empty description, no tags, unlisted.
    pub fn unlisted(title: impl Into<String>) -> Self {
        Self {
            snippet: Snippet {
                title: title.into(),
                description: String::new(),
                tags: Vec::new(),
            },
            status: Status {
                privacy_status: "unlisted".to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: Option<String>,
}

pub fn watch_url(id: &str) -> String {
    format!("{}/{}", WATCH_BASE, id)
}

#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Uploads one video file and returns the new video's id.
    async fn insert_video(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
        progress: ProgressFn,
    ) -> Result<String, UploadError>;
}

pub struct YouTubeClient {
    http: Client,
    access_token: String,
    upload_url: String,
}

impl YouTubeClient {
    pub fn new(http: Client, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            upload_url: UPLOAD_URL.to_string(),
        }
    }

    pub fn with_upload_url(mut self, upload_url: impl Into<String>) -> Self {
        self.upload_url = upload_url.into();
        self
    }
}

fn multipart_head(metadata_json: &str) -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{json}\r\n--{b}\r\nContent-Type: video/*\r\n\r\n",
        b = BOUNDARY,
        json = metadata_json
    )
    .into_bytes()
}

fn multipart_tail() -> Vec<u8> {
    format!("\r\n--{}--\r\n", BOUNDARY).into_bytes()
}

/// Streams `file` in chunks, reporting progress after each read.
fn media_stream(
    file: File,
    total: u64,
    progress: ProgressFn,
) -> impl futures_util::Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    stream::unfold((file, 0u64, false), move |(mut file, read, done)| {
        let progress = progress.clone();
        async move {
            if done {
                return None;
            }
            let mut buf = vec![0u8; READ_CHUNK];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    let read = read + n as u64;
                    progress(read, total);
                    Some((Ok(buf), (file, read, false)))
                }
                Err(err) => Some((Err(err), (file, read, true))),
            }
        }
    })
}

#[async_trait]
impl VideoPlatform for YouTubeClient {
    async fn insert_video(
        &self,
        path: &Path,
        metadata: &VideoMetadata,
        progress: ProgressFn,
    ) -> Result<String, UploadError> {
        let io_err = |source| UploadError::Io {
            path: path.display().to_string(),
            source,
        };
        let file = File::open(path).await.map_err(io_err)?;
        let size = file.metadata().await.map_err(io_err)?.len();

        let metadata_json = serde_json::to_string(metadata)
            .map_err(|err| io_err(std::io::Error::other(err)))?;
        let head = multipart_head(&metadata_json);
        let tail = multipart_tail();
        let content_length = head.len() as u64 + size + tail.len() as u64;

        let body = stream::once(async move { Ok::<_, std::io::Error>(head) })
            .chain(media_stream(file, size, progress))
            .chain(stream::once(async move { Ok(tail) }));

        let resp = self
            .http
            .post(&self.upload_url)
            .bearer_auth(&self.access_token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", BOUNDARY),
            )
            .header(reqwest::header::CONTENT_LENGTH, content_length)
            .body(Body::wrap_stream(body))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: InsertResponse = resp.json().await?;
        parsed.id.ok_or(UploadError::MissingId)
    }
}
