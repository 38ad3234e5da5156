use crate::api::texttospeech::{SpeechError, SpeechSynthesizer};
use crate::card::{self, CardRenderer};
use crate::config::GenerationConfig;
use crate::ffmpeg::VideoMuxer;
use crate::init::ensure_dir;
use crate::narration;
use crate::{loge, logi, logok, logw};
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

pub const INPUT_EXTENSION: &str = "txt";

/// Steps one input file goes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Read,
    Synthesize,
    SaveAudio,
    RenderImage,
    SaveImage,
    Mux,
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileStage::Read => "read",
            FileStage::Synthesize => "synthesize",
            FileStage::SaveAudio => "save audio",
            FileStage::RenderImage => "render image",
            FileStage::SaveImage => "save image",
            FileStage::Mux => "mux",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct StageFailure {
    pub stage: FileStage,
    pub error: anyhow::Error,
}

trait AtStage<T> {
    fn at(self, stage: FileStage) -> Result<T, StageFailure>;
}

impl<T, E> AtStage<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn at(self, stage: FileStage) -> Result<T, StageFailure> {
        self.map_err(|err| StageFailure {
            stage,
            error: err.into(),
        })
    }
}

/// The `.mp3`/`.png`/`.mp4` written for one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub name: String,
    pub audio: PathBuf,
    pub image: PathBuf,
    pub video: PathBuf,
}

impl ArtifactSet {
    pub fn for_name(output_dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            audio: output_dir.join(format!("{}.mp3", name)),
            image: output_dir.join(format!("{}.png", name)),
            video: output_dir.join(format!("{}.mp4", name)),
        }
    }
}

#[derive(Debug)]
pub struct FailedFile {
    pub name: String,
    pub stage: FileStage,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<ArtifactSet>,
    pub failed: Vec<FailedFile>,
}

/// Directories and card strings the driver needs.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub title: String,
    pub author: String,
}

impl From<&GenerationConfig> for BatchSettings {
    fn from(cfg: &GenerationConfig) -> Self {
        Self {
            input_dir: cfg.input_dir.clone(),
            output_dir: cfg.output_dir.clone(),
            title: cfg.book_name.clone(),
            author: cfg.author.clone(),
        }
    }
}

pub struct Generator {
    settings: BatchSettings,
    synth: Box<dyn SpeechSynthesizer>,
    renderer: Box<dyn CardRenderer>,
    muxer: Box<dyn VideoMuxer>,
}

fn strip_ext(path: &Path) -> String {
    path.file_stem()
        .and_then(OsStr::to_str)
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Input documents in file-name order.
pub fn list_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let is_text = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| ext.eq_ignore_ascii_case(INPUT_EXTENSION))
            .unwrap_or(false);
        if is_text {
            out.push(path.to_path_buf());
        }
    }
    Ok(out)
}

impl Generator {
    pub fn new(
        settings: BatchSettings,
        synth: Box<dyn SpeechSynthesizer>,
        renderer: Box<dyn CardRenderer>,
        muxer: Box<dyn VideoMuxer>,
    ) -> Self {
        Self {
            settings,
            synth,
            renderer,
            muxer,
        }
    }

    async fn process_file(&self, input: &Path, name: &str) -> Result<ArtifactSet, StageFailure> {
        let artifacts = ArtifactSet::for_name(&self.settings.output_dir, name);

        let text = fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))
            .at(FileStage::Read)?;

        let audio = narration::synthesize_document(self.synth.as_ref(), name, &text)
            .await
            .at(FileStage::Synthesize)?;
        if audio.is_empty() {
            return Err(StageFailure {
                stage: FileStage::Synthesize,
                error: anyhow::anyhow!("no audio was synthesized for {}", name),
            });
        }

        fs::write(&artifacts.audio, &audio)
            .await
            .with_context(|| format!("Failed to write {}", artifacts.audio.display()))
            .at(FileStage::SaveAudio)?;
        logok(format!("file {}.mp3 generated!", name));

        let image = self
            .renderer
            .render(
                &card::caption_lines(name),
                &self.settings.title,
                &self.settings.author,
            )
            .at(FileStage::RenderImage)?;
        card::save_png(&image, &artifacts.image)
            .await
            .at(FileStage::SaveImage)?;
        logok(format!("image {}.png generated!", name));

        self.muxer
            .mux(&artifacts.image, &artifacts.audio, &artifacts.video)
            .await
            .at(FileStage::Mux)?;
        logok(format!("video {}.mp4 generated!", name));

        Ok(artifacts)
    }

    /// Processes every input document in order. A failing file is logged
    /// and skipped; whatever it already wrote stays on disk.
    pub async fn run(&self) -> Result<BatchReport> {
        ensure_dir(&self.settings.output_dir).await?;
        let inputs = list_inputs(&self.settings.input_dir)?;
        logi(format!(
            "Found {} input files in {}",
            inputs.len(),
            self.settings.input_dir.display()
        ));

        let mut report = BatchReport::default();
        for input in inputs {
            let name = strip_ext(&input);
            logi(format!("=== Processing: {} ===", name));

            match self.process_file(&input, &name).await {
                Ok(artifacts) => {
                    logok(format!("DONE: {}", name));
                    report.completed.push(artifacts);
                }
                Err(failure) => {
                    loge(format!(
                        "FAILED: {} at {}: {:#}",
                        name, failure.stage, failure.error
                    ));
                    if let Some(payload) = failure
                        .error
                        .downcast_ref::<SpeechError>()
                        .and_then(SpeechError::payload)
                    {
                        logw(format!("speech API error payload: {}", payload));
                    }
                    report.failed.push(FailedFile {
                        name,
                        stage: failure.stage,
                        error: format!("{:#}", failure.error),
                    });
                }
            }
        }

        logi(format!(
            "All done. Generated: {}, failed: {}",
            report.completed.len(),
            report.failed.len()
        ));
        Ok(report)
    }
}
