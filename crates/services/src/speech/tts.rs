use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use super::{AudioClip, SpeechSynthesizer};
use crate::config::SpeechConfig;
use crate::error::SpeechError;

/// Text-to-speech over an OpenAI-compatible `/audio/speech` endpoint.
#[derive(Clone)]
pub struct HttpSpeechSynthesizer {
    client: Client,
    config: Option<SpeechConfig>,
}

impl HttpSpeechSynthesizer {
    /// # Errors
    ///
    /// Returns `SpeechError::Http` if the HTTP client cannot be built.
    pub fn new(config: Option<SpeechConfig>, timeout: Duration) -> Result<Self, SpeechError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, SpeechError> {
        let config = self.config.as_ref().ok_or(SpeechError::Disabled)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let url = format!("{}/audio/speech", config.base_url.trim_end_matches('/'));
        let payload = SpeechRequest {
            model: &config.model,
            input: text,
            voice: &config.voice,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SpeechError::HttpStatus(response.status()));
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        tracing::debug!(chars = text.chars().count(), bytes = bytes.len(), "speech synthesized");
        Ok(AudioClip::new(bytes.to_vec(), mime))
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}
