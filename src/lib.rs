//! Основной файл библиотеки eduvid
//!
//! Собирает обучающее видео из сценария: озвучивает предложения, рассчитывает
//! тайминги субтитров, подгоняет длительность клипов под озвучку, склеивает
//! клипы, накладывает субтитры и добавляет общую дорожку озвучки.
//!
//! Этапы выполняются последовательно. Каждый этап завершается полностью до
//! начала следующего, любая ошибка прерывает запуск.

pub mod config;
pub mod error;
pub mod generation;
pub mod media;
pub mod models;
pub mod narration;
pub mod progress;
pub mod run;
pub mod subtitle;
pub mod tts;
pub mod utils;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info};
use tokio::sync::mpsc::Sender;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::generation::ClipSlots;
use crate::media::{
    AssembledTimeline, ClipRetimer, FfmpegTools, MediaProbe, MediaTransformer, RetimeJob,
    TimelineAssembler,
};
use crate::models::{RetimedClip, Segment, SegmentDurationRecord};
use crate::narration::{aggregate, NarrationTimer};
use crate::progress::{send_progress, PipelineProgress};
use crate::tts::SpeechSynthesizer;
use crate::utils::RunWorkspace;

pub use crate::error::PipelineError;

/// Имя файла субтитров в выходном каталоге
pub const SUBTITLES_FILE: &str = "subtitles.srt";
/// Имя общей дорожки озвучки в выходном каталоге
pub const COMBINED_AUDIO_FILE: &str = "combined_audio.wav";
/// Имя итогового видео в выходном каталоге
pub const FINAL_VIDEO_FILE: &str = "final_vid.mp4";

/// Результат успешного запуска
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub final_video: PathBuf,
    pub subtitles: PathBuf,
    pub combined_audio: PathBuf,
    pub records: Vec<SegmentDurationRecord>,
    pub retimed: Vec<RetimedClip>,
    /// Сегменты без исходного клипа
    pub skipped: Vec<u32>,
}

struct StageOutput {
    records: Vec<SegmentDurationRecord>,
    retimed: Vec<RetimedClip>,
    skipped: Vec<u32>,
    assembled: AssembledTimeline,
}

/// Конвейер сборки видео
pub struct VideoPipeline {
    config: PipelineConfig,
    synthesizer: Box<dyn SpeechSynthesizer>,
    probe: Arc<dyn MediaProbe>,
    transformer: Arc<dyn MediaTransformer>,
    progress_sender: Option<Sender<PipelineProgress>>,
}

impl VideoPipeline {
    pub fn new(
        config: PipelineConfig,
        synthesizer: Box<dyn SpeechSynthesizer>,
        probe: Arc<dyn MediaProbe>,
        transformer: Arc<dyn MediaTransformer>,
    ) -> Self {
        Self {
            config,
            synthesizer,
            probe,
            transformer,
            progress_sender: None,
        }
    }

    /// Конвейер с ffmpeg/ffprobe из конфигурации
    pub fn with_ffmpeg(config: PipelineConfig, synthesizer: Box<dyn SpeechSynthesizer>) -> Self {
        let tools = Arc::new(FfmpegTools::new(&config.media));
        Self::new(config, synthesizer, tools.clone(), tools)
    }

    /// Установить канал для уведомлений о прогрессе
    pub fn with_progress(mut self, sender: Sender<PipelineProgress>) -> Self {
        self.progress_sender = Some(sender);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn transformer(&self) -> &dyn MediaTransformer {
        self.transformer.as_ref()
    }

    pub(crate) fn progress_sender(&self) -> &Option<Sender<PipelineProgress>> {
        &self.progress_sender
    }

    /// Запускает конвейер.
    ///
    /// Raw clips are read from `clips`; the subtitle file, the combined audio
    /// track and the finished video are published into `output_dir` only after
    /// every stage has succeeded.
    pub async fn run(
        &self,
        segments: &[Segment],
        clips: &ClipSlots,
        output_dir: &Path,
    ) -> Result<PipelineOutput> {
        info!(
            "Starting pipeline for {} segments, output to {}",
            segments.len(),
            output_dir.display()
        );
        send_progress(&self.progress_sender, PipelineProgress::Started).await;

        tokio::fs::create_dir_all(output_dir).await?;
        let workspace = RunWorkspace::new(output_dir, self.config.keep_intermediates)?;

        let stages = match self.run_stages(segments, clips, &workspace).await {
            Ok(stages) => stages,
            Err(e) => {
                error!("Pipeline failed at {} stage: {}", e.stage(), e);
                return Err(e);
            }
        };

        let subtitles = workspace.publish(&workspace.file(SUBTITLES_FILE), output_dir)?;
        let combined_audio = workspace.publish(&stages.assembled.combined_audio, output_dir)?;
        let final_video = workspace.publish(&stages.assembled.final_video, output_dir)?;

        send_progress(&self.progress_sender, PipelineProgress::Finished).await;
        info!("Pipeline finished: {}", final_video.display());

        Ok(PipelineOutput {
            final_video,
            subtitles,
            combined_audio,
            records: stages.records,
            retimed: stages.retimed,
            skipped: stages.skipped,
        })
    }

    async fn run_stages(
        &self,
        segments: &[Segment],
        clips: &ClipSlots,
        workspace: &RunWorkspace,
    ) -> Result<StageOutput> {
        let policy = &self.config.timing;

        // 1. Озвучка и тайминги
        let timeline = NarrationTimer::new(self.synthesizer.as_ref(), policy, workspace.narration_dir())
            .with_progress(self.progress_sender.clone())
            .run(segments)
            .await?;

        // 2. Длительности сегментов и субтитры
        let subtitles = workspace.file(SUBTITLES_FILE);
        let records = aggregate(&timeline.raw_durations, &timeline.cues, policy, &subtitles)?;
        send_progress(&self.progress_sender, PipelineProgress::SubtitlesWritten).await;

        // 3. Подгонка клипов
        let jobs: Vec<RetimeJob> = records
            .iter()
            .filter_map(|record| {
                segments
                    .iter()
                    .find(|s| s.ordinal == record.segment)
                    .map(|segment| RetimeJob {
                        record: *record,
                        source: clips.source_for(segment),
                    })
            })
            .collect();

        let outcome = ClipRetimer::new(
            self.probe.as_ref(),
            self.transformer.as_ref(),
            workspace.retimed_dir(),
            self.config.media.retime_tolerance,
        )
        .with_progress(self.progress_sender.clone())
        .run(&jobs)
        .await?;

        // 4. Сборка
        let assembled = TimelineAssembler::new(self.transformer.as_ref(), policy, workspace.path())
            .with_progress(self.progress_sender.clone())
            .assemble(&outcome.retimed, &timeline.clips, &subtitles)
            .await?;

        Ok(StageOutput {
            records,
            retimed: outcome.retimed,
            skipped: outcome.skipped,
            assembled,
        })
    }
}
