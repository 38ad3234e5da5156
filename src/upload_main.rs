use anyhow::{Context, Result};
use narrated_uploads::config::UploadConfig;
use narrated_uploads::{auth, init, uploader};

#[tokio::main]
async fn main() -> Result<()> {
    init::init_tracing();

    let cfg = UploadConfig::from_env()?;
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;

    let session = auth::authorize(&cfg, client)
        .await
        .context("Authorization failed")?;

    let youtube = session.youtube();
    uploader::upload_all(&youtube, &cfg.video_dir, cfg.upload_delay).await?;
    Ok(())
}
