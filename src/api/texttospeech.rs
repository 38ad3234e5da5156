use crate::config::VoiceConfig;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SYNTHESIZE_URL: &str = "https://texttospeech.googleapis.com/v1beta1/text:synthesize";

/// Stable fragment of the message the API returns when a request exceeds
/// its input limit.
const INPUT_TOO_LONG_FRAGMENT: &str = "longer than the limit of 5000 bytes";

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech input longer than the 5000 byte limit")]
    InputTooLong,
    #[error("speech API HTTP {status}: {message}")]
    Api {
        status: u16,
        message: String,
        payload: Option<serde_json::Value>,
    },
    #[error("speech request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("speech response had no audioContent")]
    MissingAudio,
    #[error("speech audioContent is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl SpeechError {
    /// Structured error body returned by the API, if any.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            SpeechError::Api { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesizes one request's text and returns encoded audio bytes.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
    ssml_gender: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f32,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
    input: SynthesisInput<'a>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

pub struct GoogleTts {
    client: Client,
    api_key: String,
    voice: VoiceConfig,
    endpoint: String,
}

impl GoogleTts {
    pub fn new(client: Client, api_key: impl Into<String>, voice: VoiceConfig) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            voice,
            endpoint: SYNTHESIZE_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body<'a>(&'a self, text: &'a str) -> SynthesizeRequest<'a> {
        SynthesizeRequest {
            voice: VoiceSelection {
                language_code: &self.voice.language_code,
                name: &self.voice.name,
                ssml_gender: &self.voice.ssml_gender,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: self.voice.speaking_rate,
            },
            input: SynthesisInput { text },
        }
    }
}

/// Maps a non-success response body onto a [`SpeechError`].
pub fn classify_error(status: u16, raw: &str) -> SpeechError {
    let payload: Option<serde_json::Value> = serde_json::from_str(raw).ok();
    let message = serde_json::from_str::<ErrorEnvelope>(raw)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| raw.chars().take(800).collect());

    if message.contains(INPUT_TOO_LONG_FRAGMENT) {
        return SpeechError::InputTooLong;
    }

    SpeechError::Api {
        status,
        message,
        payload: payload.and_then(|v| v.get("error").cloned()),
    }
}

pub fn decode_audio_content(encoded: &str) -> Result<Vec<u8>, SpeechError> {
    Ok(STANDARD.decode(encoded.trim())?)
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(text))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &raw));
        }

        let body: SynthesizeResponse = resp.json().await?;
        let encoded = body.audio_content.ok_or(SpeechError::MissingAudio)?;
        decode_audio_content(&encoded)
    }
}
