//! Клиент ElevenLabs Text-to-Speech

use log::{debug, info};
use reqwest::Client;
use serde::Serialize;

use super::{read_audio_response, AudioFormat, SpeechSynthesizer, SynthesizedAudio, TtsError};
use crate::config::TtsConfig;

const API_BASE: &str = "https://api.elevenlabs.io/v1/text-to-speech";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// Клиент для работы с ElevenLabs API
pub struct ElevenLabsClient {
    client: Client,
    api_key: String,
    voice_id: String,
    model_id: String,
    output_format: String,
}

impl ElevenLabsClient {
    pub fn new(config: &TtsConfig) -> Result<Self, TtsError> {
        if config.elevenlabs_api_key.trim().is_empty() {
            return Err(TtsError::Configuration(
                "ElevenLabs API key is required for speech synthesis".to_string(),
            ));
        }

        // Длительность измеряется декодированием, сырой PCM без заголовка не подходит
        if !config.elevenlabs_output_format.starts_with("mp3") {
            return Err(TtsError::Configuration(format!(
                "Unsupported ElevenLabs output format: {}",
                config.elevenlabs_output_format
            )));
        }

        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            api_key: config.elevenlabs_api_key.clone(),
            voice_id: config.elevenlabs_voice_id.clone(),
            model_id: config.elevenlabs_model_id.clone(),
            output_format: config.elevenlabs_output_format.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", API_BASE, self.voice_id)
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, TtsError> {
        debug!("Sending ElevenLabs TTS request ({} chars)", text.len());

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("output_format", self.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await?;

        let data = read_audio_response(response).await?;
        info!("Received {} bytes of narration audio", data.len());

        Ok(SynthesizedAudio {
            data,
            format: AudioFormat::Mp3,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let config = TtsConfig::default();
        assert!(matches!(
            ElevenLabsClient::new(&config),
            Err(TtsError::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_raw_pcm_format() {
        let config = TtsConfig {
            elevenlabs_api_key: "key".to_string(),
            elevenlabs_output_format: "pcm_16000".to_string(),
            ..TtsConfig::default()
        };
        assert!(ElevenLabsClient::new(&config).is_err());
    }

    #[test]
    fn test_endpoint() {
        let config = TtsConfig {
            elevenlabs_api_key: "key".to_string(),
            ..TtsConfig::default()
        };
        let client = ElevenLabsClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://api.elevenlabs.io/v1/text-to-speech/7VqWGAWwo2HMrylfKrcm"
        );
    }
}
