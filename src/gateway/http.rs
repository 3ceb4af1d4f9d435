use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::engine::{Engines, SpeechToText, SynthesizedAudio, Synthesizer, Translator};
use crate::audio::UtteranceAudio;
use crate::config::{EngineConfig, EnginesConfig};
use crate::error::ServiceFailure;

/// Longest engine error body kept in a failure cause
const MAX_ERROR_BODY: usize = 512;

/// Apply auth + timeout, send, and turn non-success statuses into failures
async fn send(request: RequestBuilder, config: &EngineConfig) -> Result<Response, ServiceFailure> {
    let mut request = request.timeout(Duration::from_secs(config.timeout_secs));
    if let Some(key) = &config.api_key {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|e| ServiceFailure::from_reqwest(e, config.timeout_secs))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(ServiceFailure::Status {
        status: status.as_u16(),
        body,
    })
}

impl Engines {
    /// HTTP adapters sharing one connection pool
    pub fn http(config: &EnginesConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("voice-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            transcriber: Arc::new(HttpTranscriber::new(
                client.clone(),
                config.transcription.clone(),
            )),
            translator: Arc::new(HttpTranslator::new(client.clone(), config.translation.clone())),
            synthesizer: Arc::new(HttpSynthesizer::new(client, config.synthesis.clone())),
        })
    }
}

// ============================================================================
// Speech-to-text
// ============================================================================

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    segments: Vec<TranscriptionSegment>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionSegment {
    text: String,
}

impl TranscriptionResponse {
    fn into_text(self) -> Result<String, ServiceFailure> {
        match self.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ if !self.segments.is_empty() => Ok(self
                .segments
                .iter()
                .map(|s| s.text.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ")),
            Some(text) => Ok(text),
            None => Err(ServiceFailure::Malformed(
                "response has neither text nor segments".to_string(),
            )),
        }
    }
}

/// Multipart upload to an OpenAI-compatible `/v1/audio/transcriptions` endpoint
pub struct HttpTranscriber {
    client: Client,
    config: EngineConfig,
}

impl HttpTranscriber {
    pub fn new(client: Client, config: EngineConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl SpeechToText for HttpTranscriber {
    async fn transcribe(&self, audio: &UtteranceAudio) -> Result<String, ServiceFailure> {
        let part = Part::bytes(audio.bytes.to_vec())
            .file_name(audio.encoding.upload_file_name())
            .mime_str(audio.encoding.mime_type())
            .map_err(|e| ServiceFailure::Transport(e.to_string()))?;

        let mut form = Form::new().part("file", part);
        if let Some(model) = &self.config.model {
            form = form.text("model", model.clone());
        }

        let response = send(
            self.client.post(&self.config.url).multipart(form),
            &self.config,
        )
        .await?;

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ServiceFailure::Malformed(e.to_string()))?;

        body.into_text()
    }

    fn name(&self) -> &str {
        "http-stt"
    }
}

// ============================================================================
// Translation
// ============================================================================

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

/// JSON call to a LibreTranslate-style `/translate` endpoint
pub struct HttpTranslator {
    client: Client,
    config: EngineConfig,
}

impl HttpTranslator {
    pub fn new(client: Client, config: EngineConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ServiceFailure> {
        let request = TranslateRequest {
            q: text,
            source: "auto",
            target: target_language,
            format: "text",
            api_key: self.config.api_key.as_deref(),
        };

        let response = send(
            self.client.post(&self.config.url).json(&request),
            &self.config,
        )
        .await?;

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| ServiceFailure::Malformed(e.to_string()))?;

        if body.translated_text.trim().is_empty() {
            return Err(ServiceFailure::EmptyResult);
        }

        debug!(target_language, "Translated {} chars", body.translated_text.len());
        Ok(body.translated_text)
    }

    fn name(&self) -> &str {
        "http-translate"
    }
}

// ============================================================================
// Synthesis
// ============================================================================

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// JSON call to an OpenAI-compatible `/v1/audio/speech` endpoint
pub struct HttpSynthesizer {
    client: Client,
    config: EngineConfig,
}

impl HttpSynthesizer {
    pub fn new(client: Client, config: EngineConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &str,
    ) -> Result<SynthesizedAudio, ServiceFailure> {
        let request = SpeechRequest {
            model: self.config.model.as_deref(),
            input: text,
            voice,
            response_format: "mp3",
        };

        let response = send(
            self.client.post(&self.config.url).json(&request),
            &self.config,
        )
        .await?;

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceFailure::from_reqwest(e, self.config.timeout_secs))?;

        if bytes.is_empty() {
            return Err(ServiceFailure::EmptyResult);
        }

        debug!(language, voice, "Synthesized {} bytes", bytes.len());
        Ok(SynthesizedAudio { bytes, mime_type })
    }

    fn name(&self) -> &str {
        "http-tts"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcription_response_prefers_text() {
        let body: TranscriptionResponse =
            serde_json::from_str(r#"{"text":"hello world","segments":[{"text":"x"}]}"#).unwrap();
        assert_eq!(body.into_text().unwrap(), "hello world");
    }

    #[test]
    fn test_transcription_response_joins_segments() {
        let body: TranscriptionResponse =
            serde_json::from_str(r#"{"segments":[{"text":" hello "},{"text":"world "}]}"#).unwrap();
        assert_eq!(body.into_text().unwrap(), "hello world");
    }

    #[test]
    fn test_transcription_response_without_text_is_malformed() {
        let body: TranscriptionResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(matches!(body.into_text(), Err(ServiceFailure::Malformed(_))));
    }

    #[test]
    fn test_translate_request_shape() {
        let request = TranslateRequest {
            q: "hello",
            source: "auto",
            target: "es",
            format: "text",
            api_key: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["q"], "hello");
        assert_eq!(value["target"], "es");
        assert!(value.get("api_key").is_none());
    }
}
