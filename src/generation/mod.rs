//! Внешняя генерация клипов и ожидание их готовности
//!
//! Конвейер начинает подгонку клипов только после того, как готовы все
//! клипы. Ожидание опирается на `tokio::time`, поэтому в тестах его можно
//! прогонять на остановленных часах.

use std::path::Path;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::mpsc::Sender;
use tokio::time::{sleep, Instant};

use crate::config::GenerationConfig;
use crate::error::{PipelineError, Result};
use crate::models::Segment;
use crate::progress::{send_progress, PipelineProgress};

pub mod slots;

pub use slots::ClipSlots;

/// Состояние задания на генерацию
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipJobStatus {
    Pending,
    /// Клип готов, `location` передаётся в [`ClipGenerator::download`]
    Completed { location: String },
    Failed { message: String },
}

/// Отправленное задание
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipJob {
    pub segment: u32,
    pub job_id: String,
}

/// Готовый к загрузке клип
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyClip {
    pub segment: u32,
    pub location: String,
}

/// Сервис генерации видео по текстовому промпту
#[async_trait::async_trait]
pub trait ClipGenerator: Send + Sync {
    /// Отправляет задание для сегмента и возвращает его идентификатор
    async fn submit(&self, segment: &Segment) -> Result<String>;

    async fn status(&self, job_id: &str) -> Result<ClipJobStatus>;

    /// Скачивает готовый клип в `destination`
    async fn download(&self, location: &str, destination: &Path) -> Result<()>;
}

/// Опрашивает задания, пока все не будут готовы.
///
/// A failed job aborts immediately. Once `timeout` has elapsed without every
/// job completing, returns [`PipelineError::Timeout`].
pub async fn await_all_clips(
    generator: &dyn ClipGenerator,
    jobs: &[ClipJob],
    interval: Duration,
    timeout: Duration,
    progress_sender: &Option<Sender<PipelineProgress>>,
) -> Result<Vec<ReadyClip>> {
    let deadline = Instant::now() + timeout;
    let mut locations: Vec<Option<String>> = vec![None; jobs.len()];

    loop {
        for (job, location) in jobs.iter().zip(locations.iter_mut()) {
            if location.is_some() {
                continue;
            }
            match generator.status(&job.job_id).await? {
                ClipJobStatus::Pending => {}
                ClipJobStatus::Completed { location: ready } => {
                    info!("Clip for segment {} is ready", job.segment);
                    *location = Some(ready);
                }
                ClipJobStatus::Failed { message } => {
                    error!("Clip generation failed for segment {}: {}", job.segment, message);
                    return Err(PipelineError::ClipGeneration {
                        segment: job.segment,
                        message,
                    });
                }
            }
        }

        let ready = locations.iter().filter(|l| l.is_some()).count();
        send_progress(
            progress_sender,
            PipelineProgress::WaitingForClips {
                ready,
                total: jobs.len(),
            },
        )
        .await;

        if ready == jobs.len() {
            break;
        }

        let now = Instant::now();
        if now >= deadline {
            warn!("{} of {} clips ready when the wait timed out", ready, jobs.len());
            return Err(PipelineError::Timeout {
                what: format!("{} clip(s)", jobs.len() - ready),
                seconds: timeout.as_secs_f64(),
            });
        }

        sleep(interval.min(deadline - now)).await;
    }

    Ok(jobs
        .iter()
        .zip(locations)
        .filter_map(|(job, location)| {
            location.map(|location| ReadyClip {
                segment: job.segment,
                location,
            })
        })
        .collect())
}

/// Заказывает клипы для всех сегментов, дожидается их и раскладывает по слотам
pub async fn populate_clip_slots(
    generator: &dyn ClipGenerator,
    segments: &[Segment],
    slots: &ClipSlots,
    config: &GenerationConfig,
    progress_sender: &Option<Sender<PipelineProgress>>,
) -> Result<()> {
    let mut jobs = Vec::with_capacity(segments.len());
    for segment in segments {
        let job_id = generator.submit(segment).await?;
        info!("Submitted clip job {} for segment {}", job_id, segment.ordinal);
        jobs.push(ClipJob {
            segment: segment.ordinal,
            job_id,
        });
    }

    let ready = await_all_clips(
        generator,
        &jobs,
        config.poll_interval(),
        config.timeout(),
        progress_sender,
    )
    .await?;

    for clip in ready {
        let Some(segment) = segments.iter().find(|s| s.ordinal == clip.segment) else {
            continue;
        };
        let destination = slots.clip_path(segment);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        generator.download(&clip.location, &destination).await?;
        info!(
            "Downloaded clip for segment {} to {}",
            clip.segment,
            destination.display()
        );
    }

    Ok(())
}
