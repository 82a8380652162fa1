//! Подгонка длительности исходных клипов под озвучку

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use tokio::sync::mpsc::Sender;

use super::{MediaProbe, MediaTransformer};
use crate::error::{PipelineError, Result};
use crate::media::MediaError;
use crate::models::{RetimedClip, SegmentDurationRecord};
use crate::progress::{send_progress, PipelineProgress};

/// Задание на растягивание одного клипа
#[derive(Debug, Clone, PartialEq)]
pub struct RetimeJob {
    pub record: SegmentDurationRecord,
    /// Где ожидается исходный клип сегмента
    pub source: PathBuf,
}

/// Результат этапа подгонки
#[derive(Debug, Clone, Default)]
pub struct RetimeOutcome {
    pub retimed: Vec<RetimedClip>,
    /// Сегменты, для которых не нашлось исходного клипа
    pub skipped: Vec<u32>,
}

/// Растягивает клипы под целевые длительности сегментов
pub struct ClipRetimer<'a> {
    probe: &'a dyn MediaProbe,
    transformer: &'a dyn MediaTransformer,
    output_dir: PathBuf,
    tolerance: f64,
    progress_sender: Option<Sender<PipelineProgress>>,
}

impl<'a> ClipRetimer<'a> {
    pub fn new(
        probe: &'a dyn MediaProbe,
        transformer: &'a dyn MediaTransformer,
        output_dir: impl AsRef<Path>,
        tolerance: f64,
    ) -> Self {
        Self {
            probe,
            transformer,
            output_dir: output_dir.as_ref().to_path_buf(),
            tolerance,
            progress_sender: None,
        }
    }

    pub fn with_progress(mut self, sender: Option<Sender<PipelineProgress>>) -> Self {
        self.progress_sender = sender;
        self
    }

    /// Путь растянутого клипа сегмента
    pub fn output_path(&self, segment: u32) -> PathBuf {
        self.output_dir.join(format!("segment_{:03}.mp4", segment))
    }

    /// Обрабатывает задания по порядку.
    ///
    /// A missing source clip is skipped with a warning; any probe or stretch
    /// failure aborts the stage.
    pub async fn run(&self, jobs: &[RetimeJob]) -> Result<RetimeOutcome> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut outcome = RetimeOutcome::default();
        let total = jobs.len();

        for (position, job) in jobs.iter().enumerate() {
            send_progress(
                &self.progress_sender,
                PipelineProgress::Retiming {
                    current: position + 1,
                    total,
                },
            )
            .await;

            let segment = job.record.segment;
            if !tokio::fs::try_exists(&job.source).await.unwrap_or(false) {
                warn!(
                    "Raw clip for segment {} not found at {}, skipping",
                    segment,
                    job.source.display()
                );
                outcome.skipped.push(segment);
                continue;
            }

            let clip = self.retime_one(job).await.map_err(|source| {
                error!("Retiming segment {} failed: {}", segment, source);
                PipelineError::Retime { segment, source }
            })?;
            outcome.retimed.push(clip);
        }

        info!(
            "Retimed {} clips, skipped {}",
            outcome.retimed.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    async fn retime_one(&self, job: &RetimeJob) -> std::result::Result<RetimedClip, MediaError> {
        let segment = job.record.segment;
        let target = job.record.target_duration;

        let source_duration = self.probe.probe_duration(&job.source).await?;
        if !source_duration.is_finite() || source_duration <= 0.0 {
            return Err(MediaError::InvalidOutput(format!(
                "clip {} has non-positive duration {}",
                job.source.display(),
                source_duration
            )));
        }

        let factor = target / source_duration;
        info!(
            "Segment {}: clip {:.2}s -> target {:.2}s (factor {:.3})",
            segment, source_duration, target, factor
        );

        let output = self.output_path(segment);
        self.transformer
            .time_stretch(&job.source, &output, factor, target)
            .await?;

        match self.probe.probe_duration(&output).await {
            Ok(actual) if (actual - target).abs() > self.tolerance => warn!(
                "Retimed clip for segment {} is {:.2}s, expected {:.2}s",
                segment, actual, target
            ),
            Ok(_) => {}
            Err(e) => warn!(
                "Could not verify retimed clip for segment {}: {}",
                segment, e
            ),
        }

        Ok(RetimedClip {
            segment,
            source: job.source.clone(),
            output,
            target_duration: target,
            source_duration,
            stretch_factor: factor,
        })
    }
}
