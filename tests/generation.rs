use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;
use narrated_uploads::api::texttospeech::{SpeechError, SpeechSynthesizer};
use narrated_uploads::card::{BACKGROUND, CardRenderer};
use narrated_uploads::ffmpeg::{MuxError, VideoMuxer};
use narrated_uploads::generator::{BatchSettings, FileStage, Generator};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// "Audio" is the text itself; any text containing FAIL is rejected.
struct ScriptedSynth;

#[async_trait]
impl SpeechSynthesizer for ScriptedSynth {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        if text.contains("FAIL") {
            return Err(SpeechError::Api {
                status: 500,
                message: "Internal error encountered.".into(),
                payload: Some(serde_json::json!({"code": 500, "status": "INTERNAL"})),
            });
        }
        Ok(text.as_bytes().to_vec())
    }
}

type CardCall = (Vec<String>, String, String);

#[derive(Default, Clone)]
struct RecordingRenderer {
    calls: Arc<Mutex<Vec<CardCall>>>,
}

impl CardRenderer for RecordingRenderer {
    fn render(&self, lines: &[&str], title: &str, author: &str) -> Result<RgbaImage> {
        self.calls.lock().unwrap().push((
            lines.iter().map(|l| l.to_string()).collect(),
            title.to_string(),
            author.to_string(),
        ));
        Ok(RgbaImage::from_pixel(16, 9, BACKGROUND))
    }
}

/// Writes the inputs' byte counts into the output, or fails with a fixed code.
struct FakeMuxer {
    fail_with: Option<i32>,
}

#[async_trait]
impl VideoMuxer for FakeMuxer {
    async fn mux(&self, image: &Path, audio: &Path, output: &Path) -> Result<(), MuxError> {
        if let Some(code) = self.fail_with {
            return Err(MuxError::Exit { code });
        }
        let image_len = tokio::fs::metadata(image).await?.len();
        let audio_len = tokio::fs::metadata(audio).await?.len();
        tokio::fs::write(output, format!("{}+{}", image_len, audio_len)).await?;
        Ok(())
    }
}

struct Workspace {
    _root: TempDir,
    settings: BatchSettings,
}

fn workspace(files: &[(&str, &str)]) -> Workspace {
    let root = tempfile::tempdir().unwrap();
    let input_dir = root.path().join("chapters");
    std::fs::create_dir(&input_dir).unwrap();
    for (name, text) in files {
        std::fs::write(input_dir.join(name), text).unwrap();
    }
    let settings = BatchSettings {
        input_dir,
        output_dir: root.path().join("out"),
        title: "Dom Casmurro".to_string(),
        author: "Machado de Assis".to_string(),
    };
    Workspace {
        _root: root,
        settings,
    }
}

fn has_triple(out: &Path, name: &str) -> bool {
    ["mp3", "png", "mp4"]
        .iter()
        .all(|ext| out.join(format!("{}.{}", name, ext)).is_file())
}

fn has_any(out: &Path, name: &str) -> bool {
    ["mp3", "png", "mp4"]
        .iter()
        .any(|ext| out.join(format!("{}.{}", name, ext)).exists())
}

#[tokio::test]
async fn failing_file_does_not_stop_the_batch() {
    let ws = workspace(&[
        ("01.txt", "Primeiro capitulo."),
        ("02.txt", "FAIL this one."),
        ("03.txt", "Terceiro capitulo."),
    ]);
    let renderer = RecordingRenderer::default();
    let generator = Generator::new(
        ws.settings.clone(),
        Box::new(ScriptedSynth),
        Box::new(renderer.clone()),
        Box::new(FakeMuxer { fail_with: None }),
    );

    let report = generator.run().await.unwrap();
    let out = &ws.settings.output_dir;

    assert!(has_triple(out, "01"));
    assert!(has_triple(out, "03"));
    assert!(!has_any(out, "02"));

    let completed: Vec<&str> = report.completed.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(completed, vec!["01", "03"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "02");
    assert_eq!(report.failed[0].stage, FileStage::Synthesize);

    assert_eq!(
        std::fs::read_to_string(out.join("01.mp3")).unwrap(),
        "Primeiro capitulo."
    );

    let calls = renderer.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0],
        (
            vec!["01".to_string()],
            "Dom Casmurro".to_string(),
            "Machado de Assis".to_string()
        )
    );
}

#[tokio::test]
async fn mux_failure_leaves_earlier_artifacts() {
    let ws = workspace(&[("01.txt", "Texto.")]);
    let generator = Generator::new(
        ws.settings.clone(),
        Box::new(ScriptedSynth),
        Box::new(RecordingRenderer::default()),
        Box::new(FakeMuxer { fail_with: Some(1) }),
    );

    let report = generator.run().await.unwrap();
    let out = &ws.settings.output_dir;

    assert!(report.completed.is_empty());
    assert_eq!(report.failed[0].stage, FileStage::Mux);
    assert!(report.failed[0].error.contains("exited with code: 1"));
    assert!(out.join("01.mp3").is_file());
    assert!(out.join("01.png").is_file());
    assert!(!out.join("01.mp4").exists());
}

#[tokio::test]
async fn long_document_with_only_failing_chunks_is_a_failure() {
    let text = (0..8)
        .map(|i| format!("FAIL group {} {}", i, "y".repeat(900)))
        .collect::<Vec<_>>()
        .join(".\n");
    let ws = workspace(&[("long.txt", text.as_str())]);
    let generator = Generator::new(
        ws.settings.clone(),
        Box::new(ScriptedSynth),
        Box::new(RecordingRenderer::default()),
        Box::new(FakeMuxer { fail_with: None }),
    );

    let report = generator.run().await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].stage, FileStage::Synthesize);
    assert!(!has_any(&ws.settings.output_dir, "long"));
}

#[tokio::test]
async fn non_text_inputs_are_ignored() {
    let ws = workspace(&[("cover.jpg", "binary"), ("01.txt", "Texto.")]);
    let generator = Generator::new(
        ws.settings.clone(),
        Box::new(ScriptedSynth),
        Box::new(RecordingRenderer::default()),
        Box::new(FakeMuxer { fail_with: None }),
    );

    let report = generator.run().await.unwrap();
    assert_eq!(report.completed.len(), 1);
    assert!(report.failed.is_empty());
    assert!(!has_any(&ws.settings.output_dir, "cover"));
}
