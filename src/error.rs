//! Ошибки конвейера eduvid
//!
//! Каждый этап конвейера либо завершается полностью, либо прерывает весь запуск.
//! Варианты ошибок соответствуют этапам, чтобы пользователь видел, где именно
//! произошёл сбой и какова исходная причина.

use thiserror::Error;

use crate::media::MediaError;
use crate::tts::TtsError;

/// Ошибки конвейера
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Синтез речи для предложения не удался
    #[error("Speech synthesis failed for segment {segment}, sentence {sentence}: {source}")]
    Synthesis {
        segment: u32,
        sentence: usize,
        #[source]
        source: TtsError,
    },

    /// Не удалось измерить или растянуть исходный клип
    #[error("Retiming failed for segment {segment}: {source}")]
    Retime {
        segment: u32,
        #[source]
        source: MediaError,
    },

    /// Нечего склеивать или склейка завершилась ошибкой
    #[error("Concatenation error: {0}")]
    Concatenation(String),

    /// Ошибка наложения субтитров
    #[error("Subtitle overlay failed: {0}")]
    SubtitleOverlay(#[source] MediaError),

    /// Ошибка финального объединения видео и аудио
    #[error("Mux failed: {0}")]
    Mux(#[source] MediaError),

    /// Ошибка обработки аудио (декодирование, ресемплинг, запись WAV)
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// Внешняя генерация клипа завершилась ошибкой
    #[error("Clip generation failed for segment {segment}: {message}")]
    ClipGeneration { segment: u32, message: String },

    /// Истекло время ожидания внешней операции
    #[error("Timed out after {seconds:.1}s waiting for {what}")]
    Timeout { what: String, seconds: f64 },

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Некорректный сценарий
    #[error("Invalid script: {0}")]
    InvalidScript(String),

    /// Генерация уже выполняется
    #[error("A video is already being generated")]
    RunInProgress,

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Название этапа, на котором произошёл сбой
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Synthesis { .. } => "narration",
            Self::Retime { .. } => "retiming",
            Self::Concatenation(_) => "concatenation",
            Self::SubtitleOverlay(_) => "subtitle burn-in",
            Self::Mux(_) => "mux",
            Self::AudioProcessing(_) => "audio",
            Self::ClipGeneration { .. } | Self::Timeout { .. } => "clip generation",
            Self::Configuration(_) => "configuration",
            Self::InvalidScript(_) => "script",
            Self::RunInProgress => "run gate",
            Self::Io(_) | Self::Json(_) => "io",
        }
    }
}

impl From<hound::Error> for PipelineError {
    fn from(err: hound::Error) -> Self {
        PipelineError::AudioProcessing(err.to_string())
    }
}

/// Тип Result для библиотеки eduvid
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let err = PipelineError::Concatenation("no retimed clips".to_string());
        assert_eq!(err.stage(), "concatenation");
        assert_eq!(err.to_string(), "Concatenation error: no retimed clips");

        let err = PipelineError::Mux(MediaError::InvalidOutput("empty".to_string()));
        assert_eq!(err.stage(), "mux");

        let err = PipelineError::Synthesis {
            segment: 2,
            sentence: 1,
            source: TtsError::EmptyAudio,
        };
        assert_eq!(err.stage(), "narration");
        assert!(err.to_string().contains("segment 2, sentence 1"));
    }
}
