use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";
pub const DEFAULT_OAUTH_PORT: u16 = 5001;
pub const DEFAULT_UPLOAD_DELAY: Duration = Duration::from_secs(5);

/// Voice settings sent with every speech request.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    pub language_code: String,
    pub name: String,
    pub ssml_gender: String,
    pub speaking_rate: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language_code: "pt-BR".to_string(),
            name: "pt-BR-Standard-B".to_string(),
            ssml_gender: "MALE".to_string(),
            speaking_rate: 1.2,
        }
    }
}

/// Everything the generation phase needs, read once at startup.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub tts_api_key: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub book_name: String,
    pub author: String,
    pub font_path: PathBuf,
    pub ffmpeg_bin: PathBuf,
    pub voice: VoiceConfig,
}

/// Everything the upload phase needs, read once at startup.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub client_id: String,
    pub client_secret: String,
    pub project_id: Option<String>,
    pub video_dir: PathBuf,
    pub oauth_port: u16,
    pub upload_delay: Duration,
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => anyhow::bail!("environment: {} missing", key),
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(lookup, key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("environment: {} has invalid value {:?}", key, raw)),
        None => Ok(default),
    }
}

impl GenerationConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tts_api_key = required(&lookup, "GOOGLE_TTS_API_KEY")?;
        let input_dir = match optional(&lookup, "FOLDER_PATH") {
            Some(path) => path,
            None => required(&lookup, "FOLDER_NAME")
                .context("environment: FOLDER_PATH or FOLDER_NAME must name the input folder")?,
        };
        let output_dir = required(&lookup, "RESULT_FOLDER")?;

        let defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            language_code: optional(&lookup, "TTS_LANGUAGE_CODE").unwrap_or(defaults.language_code),
            name: optional(&lookup, "TTS_VOICE_NAME").unwrap_or(defaults.name),
            ssml_gender: optional(&lookup, "TTS_SSML_GENDER").unwrap_or(defaults.ssml_gender),
            speaking_rate: parsed(&lookup, "TTS_SPEAKING_RATE", defaults.speaking_rate)?,
        };

        Ok(Self {
            tts_api_key,
            input_dir: PathBuf::from(input_dir),
            output_dir: PathBuf::from(output_dir),
            book_name: lookup("BOOK_NAME").unwrap_or_default(),
            author: lookup("AUTHOR").unwrap_or_default(),
            font_path: PathBuf::from(
                optional(&lookup, "FONT_PATH").unwrap_or_else(|| DEFAULT_FONT_PATH.to_string()),
            ),
            ffmpeg_bin: PathBuf::from(
                optional(&lookup, "FFMPEG_BIN").unwrap_or_else(|| "ffmpeg".to_string()),
            ),
            voice,
        })
    }
}

impl UploadConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            client_id: required(&lookup, "GOOGLE_CLIENT_ID")?,
            client_secret: required(&lookup, "GOOGLE_CLIENT_SECRET")?,
            project_id: optional(&lookup, "GOOGLE_PROJECT_ID"),
            video_dir: PathBuf::from(required(&lookup, "FOLDER_PATH")?),
            oauth_port: parsed(&lookup, "OAUTH_PORT", DEFAULT_OAUTH_PORT)?,
            upload_delay: Duration::from_secs(parsed(
                &lookup,
                "UPLOAD_DELAY_SECS",
                DEFAULT_UPLOAD_DELAY.as_secs(),
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn generation_config_applies_defaults() {
        let cfg = GenerationConfig::from_lookup(env(&[
            ("GOOGLE_TTS_API_KEY", "k"),
            ("FOLDER_PATH", "in"),
            ("RESULT_FOLDER", "out"),
            ("AUTHOR", "Machado de Assis"),
        ]))
        .unwrap();

        assert_eq!(cfg.input_dir, PathBuf::from("in"));
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.author, "Machado de Assis");
        assert_eq!(cfg.book_name, "");
        assert_eq!(cfg.ffmpeg_bin, PathBuf::from("ffmpeg"));
        assert_eq!(cfg.voice, VoiceConfig::default());
    }

    #[test]
    fn folder_name_is_used_when_folder_path_is_absent() {
        let cfg = GenerationConfig::from_lookup(env(&[
            ("GOOGLE_TTS_API_KEY", "k"),
            ("FOLDER_NAME", "chapters"),
            ("RESULT_FOLDER", "out"),
        ]))
        .unwrap();
        assert_eq!(cfg.input_dir, PathBuf::from("chapters"));
    }

    #[test]
    fn missing_api_key_names_the_variable() {
        let err = GenerationConfig::from_lookup(env(&[
            ("FOLDER_PATH", "in"),
            ("RESULT_FOLDER", "out"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GOOGLE_TTS_API_KEY"));
    }

    #[test]
    fn invalid_speaking_rate_is_rejected() {
        let err = GenerationConfig::from_lookup(env(&[
            ("GOOGLE_TTS_API_KEY", "k"),
            ("FOLDER_PATH", "in"),
            ("RESULT_FOLDER", "out"),
            ("TTS_SPEAKING_RATE", "fast"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TTS_SPEAKING_RATE"));
    }

    #[test]
    fn upload_config_reads_port_and_delay() {
        let cfg = UploadConfig::from_lookup(env(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("FOLDER_PATH", "videos"),
            ("OAUTH_PORT", "5055"),
            ("UPLOAD_DELAY_SECS", "9"),
        ]))
        .unwrap();
        assert_eq!(cfg.oauth_port, 5055);
        assert_eq!(cfg.upload_delay, Duration::from_secs(9));
        assert_eq!(cfg.project_id, None);
    }

    #[test]
    fn upload_config_requires_client_secret() {
        let err = UploadConfig::from_lookup(env(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("FOLDER_PATH", "videos"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GOOGLE_CLIENT_SECRET"));
    }
}
