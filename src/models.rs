//! Основные структуры данных конвейера

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Запись сценария в том виде, в котором её возвращает генератор сценария
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptEntry {
    /// Текст озвучки
    #[serde(default)]
    pub video_script: String,
    /// Промпт для генерации видео
    #[serde(default)]
    pub video_prompt: String,
}

/// Один сегмент сценария
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Порядковый номер (с единицы)
    pub ordinal: u32,
    /// Текст озвучки
    pub narration: String,
    /// Промпт для генерации видео
    pub video_prompt: String,
    /// Путь к исходному клипу, когда он уже сгенерирован
    pub raw_clip: Option<PathBuf>,
}

impl Segment {
    pub fn new(ordinal: u32, narration: impl Into<String>, video_prompt: impl Into<String>) -> Self {
        Self {
            ordinal,
            narration: narration.into(),
            video_prompt: video_prompt.into(),
            raw_clip: None,
        }
    }

    /// Слот хранилища клипов для сегмента (ordinal `n` -> slot `n - 1`)
    pub fn slot(&self) -> u32 {
        self.ordinal.saturating_sub(1)
    }
}

/// Преобразует записи сценария в упорядоченный список сегментов
pub fn segments_from_script(entries: &[ScriptEntry]) -> Vec<Segment> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| Segment::new(i as u32 + 1, entry.video_script.clone(), entry.video_prompt.clone()))
        .collect()
}

/// Читает сценарий из JSON-массива записей
pub fn parse_script(json: &str) -> Result<Vec<Segment>> {
    let entries: Vec<ScriptEntry> = serde_json::from_str(json)?;
    if entries.is_empty() {
        return Err(PipelineError::InvalidScript(
            "script contains no segments".to_string(),
        ));
    }
    Ok(segments_from_script(&entries))
}

/// Предложение из текста озвучки сегмента
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceUnit {
    pub segment: u32,
    /// Индекс внутри сегмента (с нуля)
    pub index: usize,
    pub text: String,
}

/// Озвучка одного предложения
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationClip {
    pub segment: u32,
    pub sentence: usize,
    /// Файл с синтезированным аудио
    pub path: PathBuf,
    /// Длительность, измеренная по декодированному аудио (секунды)
    pub duration: f64,
}

/// Итоговая длительность сегмента
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentDurationRecord {
    pub segment: u32,
    /// Сумма длительностей предложений без пауз
    pub raw_duration: f64,
    /// Длительность с добавкой, под которую растягивается клип
    pub target_duration: f64,
}

/// Клип, растянутый под длительность сегмента
#[derive(Debug, Clone, PartialEq)]
pub struct RetimedClip {
    pub segment: u32,
    pub source: PathBuf,
    pub output: PathBuf,
    pub target_duration: f64,
    /// Измеренная длительность исходного клипа
    pub source_duration: f64,
    pub stretch_factor: f64,
}
