//! Сборка итогового видео: склейка, дорожка озвучки, субтитры, объединение

use std::path::{Path, PathBuf};

use log::{error, info};
use tokio::sync::mpsc::Sender;

use super::audio::combine_narration;
use super::MediaTransformer;
use crate::config::TimingPolicy;
use crate::error::{PipelineError, Result};
use crate::models::{NarrationClip, RetimedClip};
use crate::progress::{send_progress, PipelineProgress};

/// Файлы, полученные при сборке
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTimeline {
    pub concatenated: PathBuf,
    pub combined_audio: PathBuf,
    pub audio_duration: f64,
    pub subtitled: PathBuf,
    pub final_video: PathBuf,
}

/// Выполняет четыре шага сборки в рабочем каталоге
pub struct TimelineAssembler<'a> {
    transformer: &'a dyn MediaTransformer,
    policy: &'a TimingPolicy,
    work_dir: PathBuf,
    progress_sender: Option<Sender<PipelineProgress>>,
}

impl<'a> TimelineAssembler<'a> {
    pub fn new(
        transformer: &'a dyn MediaTransformer,
        policy: &'a TimingPolicy,
        work_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            transformer,
            policy,
            work_dir: work_dir.as_ref().to_path_buf(),
            progress_sender: None,
        }
    }

    pub fn with_progress(mut self, sender: Option<Sender<PipelineProgress>>) -> Self {
        self.progress_sender = sender;
        self
    }

    pub async fn assemble(
        &self,
        retimed: &[RetimedClip],
        narration: &[NarrationClip],
        subtitles: &Path,
    ) -> Result<AssembledTimeline> {
        // a. склейка
        if retimed.is_empty() {
            error!("No retimed clips to concatenate");
            return Err(PipelineError::Concatenation(
                "no retimed clips to assemble".to_string(),
            ));
        }
        send_progress(&self.progress_sender, PipelineProgress::Concatenating).await;

        let mut ordered: Vec<&RetimedClip> = retimed.iter().collect();
        ordered.sort_by_key(|c| c.segment);
        let inputs: Vec<PathBuf> = ordered.iter().map(|c| c.output.clone()).collect();

        let concatenated = self.work_dir.join("concatenated.mp4");
        info!("Concatenating {} clips", inputs.len());
        self.transformer
            .concat(&inputs, &concatenated)
            .await
            .map_err(|e| PipelineError::Concatenation(e.to_string()))?;

        // b. общая дорожка
        send_progress(&self.progress_sender, PipelineProgress::CombiningAudio).await;
        let combined_audio = self.work_dir.join(crate::COMBINED_AUDIO_FILE);
        let audio_duration = combine_narration(narration, self.policy, &combined_audio)?;

        // c. субтитры
        send_progress(&self.progress_sender, PipelineProgress::BurningSubtitles).await;
        let subtitled = self.work_dir.join("subtitled.mp4");
        info!("Burning subtitles from {}", subtitles.display());
        self.transformer
            .overlay_subtitles(&concatenated, subtitles, &subtitled)
            .await
            .map_err(|e| {
                error!("Subtitle overlay failed: {}", e);
                PipelineError::SubtitleOverlay(e)
            })?;

        // d. объединение
        send_progress(&self.progress_sender, PipelineProgress::Muxing).await;
        let final_video = self.work_dir.join(crate::FINAL_VIDEO_FILE);
        info!("Muxing video and narration into {}", final_video.display());
        self.transformer
            .mux(&subtitled, &combined_audio, &final_video)
            .await
            .map_err(|e| {
                error!("Mux failed: {}", e);
                PipelineError::Mux(e)
            })?;

        Ok(AssembledTimeline {
            concatenated,
            combined_audio,
            audio_duration,
            subtitled,
            final_video,
        })
    }
}
