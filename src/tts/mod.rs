//! Синтез речи
//!
//! Конвейер обращается к синтезатору через трейт [`SpeechSynthesizer`], поэтому
//! реальные HTTP-клиенты и тестовые заглушки взаимозаменяемы.

use bytes::Bytes;
use thiserror::Error;

use crate::config::{TtsConfig, TtsEngine};

pub mod elevenlabs;
pub mod openai;

pub use elevenlabs::ElevenLabsClient;
pub use openai::OpenAiClient;

/// Ошибки синтеза речи
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TTS API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("TTS service returned no audio")]
    EmptyAudio,

    #[error("TTS service returned unplayable audio: {0}")]
    Unplayable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Формат синтезированного аудио
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

/// Результат синтеза одного фрагмента текста
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub data: Bytes,
    pub format: AudioFormat,
}

/// Трейт, который реализуют все движки синтеза речи
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Синтезирует речь для текста
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, TtsError>;
}

/// Создаёт синтезатор для выбранного в конфигурации движка
pub fn synthesizer_from_config(config: &TtsConfig) -> Result<Box<dyn SpeechSynthesizer>, TtsError> {
    match config.engine {
        TtsEngine::ElevenLabs => Ok(Box::new(ElevenLabsClient::new(config)?)),
        TtsEngine::OpenAI => Ok(Box::new(OpenAiClient::new(config)?)),
    }
}

/// Читает тело ответа, превращая неуспешный статус и пустое тело в ошибки
pub(crate) async fn read_audio_response(response: reqwest::Response) -> Result<Bytes, TtsError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
        return Err(TtsError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(TtsError::EmptyAudio);
    }
    Ok(bytes)
}
