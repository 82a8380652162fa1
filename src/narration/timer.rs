//! Синтез озвучки и расчёт таймингов субтитров
//!
//! Предложения обрабатываются строго последовательно: сегменты по порядку
//! номеров, внутри сегмента по индексу. Курсор времени общий на весь запуск.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use tokio::sync::mpsc::Sender;

use super::segmenter::sentence_units;
use crate::config::TimingPolicy;
use crate::error::{PipelineError, Result};
use crate::media::audio::decode_audio;
use crate::models::{NarrationClip, Segment};
use crate::progress::{send_progress, PipelineProgress};
use crate::subtitle::SubtitleCue;
use crate::tts::{SpeechSynthesizer, TtsError};

/// Текущее положение на общей временной шкале
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineCursor {
    /// Накопленное время (секунды)
    pub current_time: f64,
    /// Сегмент предыдущего предложения
    pub previous_segment: Option<u32>,
    /// Номер следующего субтитра
    pub next_index: usize,
}

impl Default for TimelineCursor {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            previous_segment: None,
            next_index: 1,
        }
    }
}

impl TimelineCursor {
    /// Сдвигает курсор на паузу и длительность предложения и возвращает субтитр
    pub fn advance(
        &mut self,
        policy: &TimingPolicy,
        segment: u32,
        duration: f64,
        text: &str,
    ) -> SubtitleCue {
        self.current_time += policy.gap_before(self.previous_segment, segment);

        let cue = SubtitleCue {
            index: self.next_index,
            start: self.current_time,
            end: self.current_time + duration,
            text: text.to_string(),
        };

        self.current_time = cue.end;
        self.previous_segment = Some(segment);
        self.next_index += 1;
        cue
    }
}

/// Результат этапа озвучки
#[derive(Debug, Clone, Default)]
pub struct NarrationTimeline {
    /// Озвучка в порядке обработки
    pub clips: Vec<NarrationClip>,
    pub cues: Vec<SubtitleCue>,
    /// Сумма длительностей предложений по сегментам (без пауз).
    ///
    /// Contains every segment, including those without sentences.
    pub raw_durations: BTreeMap<u32, f64>,
}

impl NarrationTimeline {
    /// Конец последнего субтитра
    pub fn total_duration(&self) -> f64 {
        self.cues.last().map(|c| c.end).unwrap_or(0.0)
    }
}

/// Озвучивает сегменты и строит временную шкалу
pub struct NarrationTimer<'a> {
    synthesizer: &'a dyn SpeechSynthesizer,
    policy: &'a TimingPolicy,
    output_dir: PathBuf,
    progress_sender: Option<Sender<PipelineProgress>>,
}

impl<'a> NarrationTimer<'a> {
    pub fn new(
        synthesizer: &'a dyn SpeechSynthesizer,
        policy: &'a TimingPolicy,
        output_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            synthesizer,
            policy,
            output_dir: output_dir.as_ref().to_path_buf(),
            progress_sender: None,
        }
    }

    pub fn with_progress(mut self, sender: Option<Sender<PipelineProgress>>) -> Self {
        self.progress_sender = sender;
        self
    }

    /// Обрабатывает все сегменты. Первая же ошибка синтеза прерывает запуск.
    pub async fn run(&self, segments: &[Segment]) -> Result<NarrationTimeline> {
        let mut ordered: Vec<&Segment> = segments.iter().collect();
        ordered.sort_by_key(|s| s.ordinal);

        let units: Vec<_> = ordered
            .iter()
            .flat_map(|s| sentence_units(s.ordinal, &s.narration))
            .collect();
        let total = units.len();
        info!(
            "Narrating {} sentences across {} segments",
            total,
            ordered.len()
        );

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut timeline = NarrationTimeline::default();
        for segment in &ordered {
            timeline.raw_durations.insert(segment.ordinal, 0.0);
        }

        let mut cursor = TimelineCursor::default();

        for (position, unit) in units.iter().enumerate() {
            send_progress(
                &self.progress_sender,
                PipelineProgress::Narration {
                    current: position + 1,
                    total,
                },
            )
            .await;

            let synthesis_error = |source: TtsError| {
                error!(
                    "Synthesis failed for segment {} sentence {}: {}",
                    unit.segment, unit.index, source
                );
                PipelineError::Synthesis {
                    segment: unit.segment,
                    sentence: unit.index,
                    source,
                }
            };

            let audio = self
                .synthesizer
                .synthesize(&unit.text)
                .await
                .map_err(synthesis_error)?;

            if audio.data.is_empty() {
                return Err(synthesis_error(TtsError::EmptyAudio));
            }

            let extension = audio.format.extension();
            let path = self.output_dir.join(format!(
                "segment_{:03}_sentence_{:03}.{}",
                unit.segment, unit.index, extension
            ));
            tokio::fs::write(&path, &audio.data).await?;

            let duration = decode_audio(&audio.data, extension)
                .map_err(|e| synthesis_error(TtsError::Unplayable(e.to_string())))?
                .duration();
            if duration <= 0.0 {
                return Err(synthesis_error(TtsError::Unplayable(
                    "decoded audio has zero duration".to_string(),
                )));
            }

            let cue = cursor.advance(self.policy, unit.segment, duration, &unit.text);
            debug!(
                "Cue {}: {:.3} -> {:.3} ({})",
                cue.index, cue.start, cue.end, unit.text
            );
            timeline.cues.push(cue);

            *timeline.raw_durations.entry(unit.segment).or_insert(0.0) += duration;
            timeline.clips.push(NarrationClip {
                segment: unit.segment,
                sentence: unit.index,
                path,
                duration,
            });
        }

        info!(
            "Narration complete: {} cues, {:.2}s total",
            timeline.cues.len(),
            timeline.total_duration()
        );
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_applies_gap_policy() {
        let policy = TimingPolicy::default();
        let mut cursor = TimelineCursor::default();

        let first = cursor.advance(&policy, 1, 2.0, "One.");
        assert_eq!(first.index, 1);
        assert_eq!(first.start, 0.0);
        assert_eq!(first.end, 2.0);

        let second = cursor.advance(&policy, 1, 1.0, "Two.");
        assert!((second.start - 2.3).abs() < 1e-9);
        assert!((second.end - 3.3).abs() < 1e-9);

        let third = cursor.advance(&policy, 2, 1.0, "Three.");
        assert!((third.start - 4.6).abs() < 1e-9);
        assert_eq!(third.index, 3);
        assert_eq!(cursor.next_index, 4);
        assert_eq!(cursor.previous_segment, Some(2));
    }

    #[test]
    fn test_cursor_honours_custom_policy() {
        let policy = TimingPolicy {
            same_segment_gap: 0.0,
            segment_boundary_gap: 0.5,
            ..TimingPolicy::default()
        };
        let mut cursor = TimelineCursor::default();
        cursor.advance(&policy, 1, 1.0, "A.");
        let b = cursor.advance(&policy, 1, 1.0, "B.");
        let c = cursor.advance(&policy, 3, 1.0, "C.");
        assert_eq!(b.start, 1.0);
        assert_eq!(c.start, 2.5);
    }
}
