use crate::logi;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use tracing_subscriber::EnvFilter;

/// Console logging for both binaries; `RUST_LOG` overrides the default
/// `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub async fn ensure_dir(path: &Path) -> Result<()> {
    if fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(());
    }
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("Failed to create dir {}", path.display()))?;
    logi(format!("Created directory: {}", path.display()));
    Ok(())
}

/// True when `program -version` runs and exits cleanly.
pub async fn check_ffmpeg(program: &Path) -> bool {
    match tokio::process::Command::new(program)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
