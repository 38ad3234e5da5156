use anyhow::{Context, Result};
use narrated_uploads::api::texttospeech::GoogleTts;
use narrated_uploads::card::TitleCard;
use narrated_uploads::config::GenerationConfig;
use narrated_uploads::ffmpeg::FfmpegMuxer;
use narrated_uploads::generator::{BatchSettings, Generator};
use narrated_uploads::init;

#[tokio::main]
async fn main() -> Result<()> {
    init::init_tracing();

    let cfg = GenerationConfig::from_env()?;

    if !init::check_ffmpeg(&cfg.ffmpeg_bin).await {
        tracing::warn!(
            "[WARN] {} not found or not runnable. Please install FFmpeg.",
            cfg.ffmpeg_bin.display()
        );
    }

    let client = reqwest::Client::builder()
        .gzip(true)
        .build()
        .context("Failed to build HTTP client")?;
    let card = TitleCard::load(&cfg.font_path)?;

    let generator = Generator::new(
        BatchSettings::from(&cfg),
        Box::new(GoogleTts::new(client, cfg.tts_api_key.clone(), cfg.voice.clone())),
        Box::new(card),
        Box::new(FfmpegMuxer::new(cfg.ffmpeg_bin.clone())),
    );

    generator.run().await?;
    Ok(())
}
