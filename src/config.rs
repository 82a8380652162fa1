//! Модуль конфигурации eduvid
//!
//! Константы тайминга (паузы и добавки к длительности сегментов) вынесены в
//! конфигурацию, чтобы их можно было переопределить в тестах и в файле настроек.

use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Политика пауз и добавок к длительности
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingPolicy {
    /// Пауза между предложениями одного сегмента (секунды)
    pub same_segment_gap: f64,
    /// Пауза на границе сегментов (секунды)
    pub segment_boundary_gap: f64,
    /// Добавка для первого и последнего сегмента (секунды)
    pub edge_padding: f64,
    /// Добавка для остальных сегментов (секунды)
    pub inner_padding: f64,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            same_segment_gap: 0.3,
            segment_boundary_gap: 1.3,
            edge_padding: 1.25,
            inner_padding: 1.9,
        }
    }
}

impl TimingPolicy {
    /// Пауза перед предложением, принадлежащим сегменту `current`.
    ///
    /// `previous` is the segment of the previously processed sentence, `None`
    /// before the very first sentence of the run.
    pub fn gap_before(&self, previous: Option<u32>, current: u32) -> f64 {
        match previous {
            None => 0.0,
            Some(prev) if prev == current => self.same_segment_gap,
            Some(_) => self.segment_boundary_gap,
        }
    }

    /// Добавка к длительности сегмента в зависимости от его положения
    pub fn padding_for(&self, is_edge: bool) -> f64 {
        if is_edge {
            self.edge_padding
        } else {
            self.inner_padding
        }
    }
}

/// Движок синтеза речи
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngine {
    #[default]
    ElevenLabs,
    OpenAI,
}

impl TtsEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ElevenLabs => "elevenlabs",
            Self::OpenAI => "openai",
        }
    }
}

/// Настройки синтеза речи
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Выбранный движок
    pub engine: TtsEngine,
    /// API ключ ElevenLabs
    pub elevenlabs_api_key: String,
    /// Голос ElevenLabs
    pub elevenlabs_voice_id: String,
    /// Модель ElevenLabs
    pub elevenlabs_model_id: String,
    /// Формат ответа ElevenLabs
    pub elevenlabs_output_format: String,
    /// API ключ OpenAI
    pub openai_api_key: String,
    /// Голос OpenAI
    pub openai_voice: String,
    /// Модель OpenAI
    pub openai_model: String,
    /// Таймаут одного запроса (секунды)
    pub request_timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            engine: TtsEngine::default(),
            elevenlabs_api_key: String::new(),
            elevenlabs_voice_id: "7VqWGAWwo2HMrylfKrcm".to_string(),
            elevenlabs_model_id: "eleven_multilingual_v2".to_string(),
            elevenlabs_output_format: "mp3_44100_128".to_string(),
            openai_api_key: String::new(),
            openai_voice: "alloy".to_string(),
            openai_model: "tts-1".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl TtsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Настройки внешних медиа-инструментов
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Путь к ffmpeg
    pub ffmpeg_path: String,
    /// Путь к ffprobe
    pub ffprobe_path: String,
    /// Стиль субтитров (force_style фильтра subtitles)
    pub subtitle_style: String,
    /// Видеокодек для растянутых клипов
    pub video_codec: String,
    /// Аудиокодек для финального файла
    pub audio_codec: String,
    /// Допустимое отклонение длительности растянутого клипа (секунды)
    pub retime_tolerance: f64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            subtitle_style: "BackColour=&HFF000000,BorderStyle=3".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            retime_tolerance: 0.25,
        }
    }
}

/// Настройки ожидания внешней генерации клипов
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Интервал опроса (секунды)
    pub poll_interval_secs: u64,
    /// Максимальное время ожидания (секунды)
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            timeout_secs: 60 * 60,
        }
    }
}

impl GenerationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Конфигурация конвейера
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub timing: TimingPolicy,
    pub tts: TtsConfig,
    pub media: MediaConfig,
    pub generation: GenerationConfig,
    /// Сохранять промежуточные файлы в выходной директории
    pub keep_intermediates: bool,
}

impl PipelineConfig {
    /// Загружает конфигурацию из JSON-файла и переменных окружения.
    ///
    /// A missing file yields the defaults. API keys from `ELEVENLABS_API_KEY`
    /// and `OPENAI_API_KEY` override whatever the file contains.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str::<PipelineConfig>(&raw).map_err(|e| {
                    PipelineError::Configuration(format!(
                        "Failed to parse {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
            Some(path) => {
                debug!("Config file {} not found, using defaults", path.display());
                PipelineConfig::default()
            }
            None => PipelineConfig::default(),
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("ELEVENLABS_API_KEY") {
            if !key.trim().is_empty() {
                self.tts.elevenlabs_api_key = key;
            }
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.tts.openai_api_key = key;
            }
        }
    }

    /// Проверка значений, которые не могут быть корректными
    pub fn validate(&self) -> Result<()> {
        let t = &self.timing;
        for (name, value) in [
            ("same_segment_gap", t.same_segment_gap),
            ("segment_boundary_gap", t.segment_boundary_gap),
            ("edge_padding", t.edge_padding),
            ("inner_padding", t.inner_padding),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::Configuration(format!(
                    "timing.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.generation.poll_interval_secs == 0 {
            return Err(PipelineError::Configuration(
                "generation.poll_interval_secs must be greater than zero".to_string(),
            ));
        }

        let key = match self.tts.engine {
            TtsEngine::ElevenLabs => &self.tts.elevenlabs_api_key,
            TtsEngine::OpenAI => &self.tts.openai_api_key,
        };
        if key.trim().is_empty() {
            return Err(PipelineError::Configuration(format!(
                "API key for TTS engine '{}' is not set",
                self.tts.engine.as_str()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_policy() {
        let policy = TimingPolicy::default();
        assert_eq!(policy.gap_before(None, 1), 0.0);
        assert_eq!(policy.gap_before(Some(1), 1), 0.3);
        assert_eq!(policy.gap_before(Some(1), 2), 1.3);
        assert_eq!(policy.gap_before(Some(3), 2), 1.3);
    }

    #[test]
    fn test_padding_policy() {
        let policy = TimingPolicy::default();
        assert_eq!(policy.padding_for(true), 1.25);
        assert_eq!(policy.padding_for(false), 1.9);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let raw = r#"{ "timing": { "same_segment_gap": 0.5 }, "tts": { "engine": "openai" } }"#;
        let config: PipelineConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.timing.same_segment_gap, 0.5);
        assert_eq!(config.timing.segment_boundary_gap, 1.3);
        assert_eq!(config.tts.engine, TtsEngine::OpenAI);
        assert_eq!(config.media.ffmpeg_path, "ffmpeg");
    }

    #[test]
    fn test_validate_rejects_negative_gap() {
        let mut config = PipelineConfig::default();
        config.tts.elevenlabs_api_key = "key".to_string();
        config.timing.inner_padding = -1.0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_requires_key_for_engine() {
        let mut config = PipelineConfig::default();
        config.tts.engine = TtsEngine::OpenAI;
        config.tts.elevenlabs_api_key = "key".to_string();
        assert!(config.validate().is_err());

        config.tts.openai_api_key = "sk-test".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(Some(&dir.path().join("missing.json"))).unwrap();
        assert_eq!(config.timing, TimingPolicy::default());
    }
}
