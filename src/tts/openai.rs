//! Клиент OpenAI TTS API

use log::{debug, info};
use reqwest::Client;
use serde::Serialize;

use super::{read_audio_response, AudioFormat, SpeechSynthesizer, SynthesizedAudio, TtsError};
use crate::config::TtsConfig;

const SPEECH_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";

/// Параметры запроса к API OpenAI TTS
#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// Клиент для работы с OpenAI TTS
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    voice: String,
}

impl OpenAiClient {
    pub fn new(config: &TtsConfig) -> Result<Self, TtsError> {
        if config.openai_api_key.trim().is_empty() {
            return Err(TtsError::Configuration(
                "OpenAI API key is required for TTS generation".to_string(),
            ));
        }

        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            voice: config.openai_voice.clone(),
        })
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, TtsError> {
        debug!("Sending TTS request to OpenAI API (model {}, voice {})", self.model, self.voice);

        let response = self
            .client
            .post(SPEECH_ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&TtsRequest {
                model: &self.model,
                input: text,
                voice: &self.voice,
                response_format: "mp3",
                speed: 1.0,
            })
            .send()
            .await?;

        let data = read_audio_response(response).await?;
        info!("Successfully generated TTS audio: {} bytes", data.len());

        Ok(SynthesizedAudio {
            data,
            format: AudioFormat::Mp3,
        })
    }
}
