//! Модуль для работы с медиа
//!
//! Измерение длительности и преобразования видео выполняются внешними
//! инструментами. Конвейер видит их только через трейты [`MediaProbe`] и
//! [`MediaTransformer`].

use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod assembler;
pub mod audio;
pub mod ffmpeg;
pub mod retime;

pub use assembler::{AssembledTimeline, TimelineAssembler};
pub use ffmpeg::FfmpegTools;
pub use retime::{ClipRetimer, RetimeJob, RetimeOutcome};

/// Ошибки внешних медиа-инструментов
#[derive(Debug, Error)]
pub enum MediaError {
    /// Не удалось запустить инструмент
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Инструмент завершился с ошибкой
    #[error("{tool} failed with status {status}: {stderr}")]
    CommandFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// Непригодный результат (пустой вывод, нулевая длительность и т.п.)
    #[error("Invalid media output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Измерение длительности медиафайла
#[async_trait::async_trait]
pub trait MediaProbe: Send + Sync {
    /// Длительность файла в секундах
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError>;
}

/// Преобразования видео
#[async_trait::async_trait]
pub trait MediaTransformer: Send + Sync {
    /// Равномерно растягивает видеопоток с коэффициентом `factor`, чтобы
    /// получить клип длительностью `target` секунд. Аудиопоток отбрасывается.
    async fn time_stretch(
        &self,
        input: &Path,
        output: &Path,
        factor: f64,
        target: f64,
    ) -> Result<(), MediaError>;

    /// Склеивает клипы в заданном порядке
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError>;

    /// Накладывает субтитры на видео
    async fn overlay_subtitles(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
    ) -> Result<(), MediaError>;

    /// Объединяет видео и аудио: видео копируется, аудио перекодируется
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MediaError>;

    /// Сохраняет первый кадр видео как изображение
    async fn extract_frame(&self, video: &Path, output: &Path) -> Result<(), MediaError>;
}
