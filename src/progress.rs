//! Уведомления о прогрессе выполнения конвейера

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

/// Обновление прогресса для отправки клиенту
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineProgress {
    /// Началась обработка
    Started,
    /// Ожидание внешней генерации клипов
    WaitingForClips { ready: usize, total: usize },
    /// Синтез и измерение озвучки
    Narration { current: usize, total: usize },
    /// Файл субтитров записан
    SubtitlesWritten,
    /// Растягивание клипов
    Retiming { current: usize, total: usize },
    /// Склейка клипов
    Concatenating,
    /// Сборка общей аудиодорожки
    CombiningAudio,
    /// Наложение субтитров
    BurningSubtitles,
    /// Объединение видео и аудио
    Muxing,
    /// Обработка завершена
    Finished,
}

/// Асинхронно отправляет обновление прогресса
pub async fn send_progress(sender: &Option<Sender<PipelineProgress>>, update: PipelineProgress) {
    if let Some(sender) = sender {
        let _ = sender.send(update).await;
    }
}
