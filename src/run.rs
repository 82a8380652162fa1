//! Запуск генерации целиком: блокировка, каталог запуска, манифест
//!
//! Одновременно выполняется не больше одной генерации. Результаты запуска
//! сохраняются в собственный каталог: промпт, тест, итоговое видео и превью.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::generation::{populate_clip_slots, ClipGenerator, ClipSlots};
use crate::models::Segment;
use crate::{PipelineOutput, VideoPipeline, FINAL_VIDEO_FILE};

const PROMPT_FILE: &str = "prompt.txt";
const QUIZ_FILE: &str = "quiz.json";
const PREVIEW_FILE: &str = "preview.jpg";
const MANIFEST_FILE: &str = "run.json";
const CLIPS_DIR: &str = "clips";

/// Признак выполняющейся генерации
#[derive(Debug, Default)]
pub struct RunGate {
    busy: AtomicBool,
}

/// Разрешение на запуск; освобождает блокировку при уничтожении
#[derive(Debug)]
pub struct RunPermit<'a> {
    gate: &'a RunGate,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Занимает блокировку или возвращает [`PipelineError::RunInProgress`]
    pub fn try_begin(&self) -> Result<RunPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::RunInProgress)?;
        Ok(RunPermit { gate: self })
    }

    pub fn in_progress(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Манифест запуска (`run.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub id: String,
    pub prompt: String,
    pub segments: usize,
    pub skipped_segments: Vec<u32>,
    pub final_video: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Каталог одного запуска
#[derive(Debug, Clone)]
pub struct RunDirectory {
    id: String,
    path: PathBuf,
}

impl RunDirectory {
    /// Создаёт каталог `<base>/<uuid>`
    pub fn create(base: &Path) -> Result<Self> {
        let id = uuid::Uuid::new_v4().to_string();
        let path = base.join(&id);
        fs::create_dir_all(&path)?;
        info!("Created run directory {}", path.display());
        Ok(Self { id, path })
    }

    /// Открывает существующий каталог запуска
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("run directory {} does not exist", path.display()),
            )));
        }
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self {
            id,
            path: path.to_path_buf(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clip_slots(&self) -> ClipSlots {
        ClipSlots::new(self.path.join(CLIPS_DIR))
    }

    pub fn final_video(&self) -> PathBuf {
        self.path.join(FINAL_VIDEO_FILE)
    }

    pub fn preview(&self) -> PathBuf {
        self.path.join(PREVIEW_FILE)
    }

    pub fn write_prompt(&self, prompt: &str) -> Result<()> {
        fs::write(self.path.join(PROMPT_FILE), prompt)?;
        Ok(())
    }

    pub fn read_prompt(&self) -> Option<String> {
        fs::read_to_string(self.path.join(PROMPT_FILE)).ok()
    }

    /// Сохраняет тест без изменений
    pub fn write_quiz(&self, quiz: &Value) -> Result<()> {
        fs::write(self.path.join(QUIZ_FILE), serde_json::to_string(quiz)?)?;
        Ok(())
    }

    pub fn read_quiz(&self) -> Result<Option<Value>> {
        let path = self.path.join(QUIZ_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&fs::read_to_string(path)?)?))
    }

    pub fn write_manifest(&self, manifest: &RunManifest) -> Result<()> {
        fs::write(
            self.path.join(MANIFEST_FILE),
            serde_json::to_string_pretty(manifest)?,
        )?;
        Ok(())
    }

    pub fn read_manifest(&self) -> Result<Option<RunManifest>> {
        let path = self.path.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&fs::read_to_string(path)?)?))
    }
}

/// Краткие сведения о сохранённом запуске
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub id: String,
    pub prompt: Option<String>,
    pub final_video: Option<PathBuf>,
    pub preview: Option<PathBuf>,
}

/// Список запусков в базовом каталоге, упорядоченный по идентификатору
pub fn list_runs(base: &Path) -> Result<Vec<RunSummary>> {
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for entry in fs::read_dir(base)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let run = RunDirectory::open(&entry.path())?;
        let final_video = run.final_video();
        let preview = run.preview();
        runs.push(RunSummary {
            id: run.id().to_string(),
            prompt: run.read_prompt(),
            final_video: final_video.exists().then_some(final_video),
            preview: preview.exists().then_some(preview),
        });
    }

    runs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(runs)
}

/// Входные данные одного запуска
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub prompt: String,
    pub segments: Vec<Segment>,
    pub quiz: Option<Value>,
}

/// Итог запуска
#[derive(Debug, Clone)]
pub struct RunResult {
    pub directory: RunDirectory,
    pub output: PipelineOutput,
    pub preview: Option<PathBuf>,
}

/// Выполняет запуски по одному, сохраняя результаты в `base_dir`
pub struct Orchestrator<'a> {
    pipeline: &'a VideoPipeline,
    gate: &'a RunGate,
    base_dir: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(pipeline: &'a VideoPipeline, gate: &'a RunGate, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            gate,
            base_dir: base_dir.into(),
        }
    }

    /// Заказывает клипы, дожидается их и собирает видео
    pub async fn generate(
        &self,
        generator: &dyn ClipGenerator,
        request: &RunRequest,
    ) -> Result<RunResult> {
        let _permit = self.gate.try_begin()?;
        let (directory, mut manifest) = self.prepare(request)?;

        let slots = directory.clip_slots();
        populate_clip_slots(
            generator,
            &request.segments,
            &slots,
            &self.pipeline.config().generation,
            self.pipeline.progress_sender(),
        )
        .await?;

        self.finish(directory, &mut manifest, request, &slots).await
    }

    /// Собирает видео из уже сгенерированных клипов
    pub async fn assemble_existing(
        &self,
        request: &RunRequest,
        clips: &ClipSlots,
    ) -> Result<RunResult> {
        let _permit = self.gate.try_begin()?;
        let (directory, mut manifest) = self.prepare(request)?;
        self.finish(directory, &mut manifest, request, clips).await
    }

    fn prepare(&self, request: &RunRequest) -> Result<(RunDirectory, RunManifest)> {
        let directory = RunDirectory::create(&self.base_dir)?;
        directory.write_prompt(&request.prompt)?;
        if let Some(quiz) = &request.quiz {
            directory.write_quiz(quiz)?;
        }

        let manifest = RunManifest {
            id: directory.id().to_string(),
            prompt: request.prompt.clone(),
            segments: request.segments.len(),
            skipped_segments: Vec::new(),
            final_video: None,
            started_at: Utc::now(),
            finished_at: None,
        };
        directory.write_manifest(&manifest)?;
        Ok((directory, manifest))
    }

    async fn finish(
        &self,
        directory: RunDirectory,
        manifest: &mut RunManifest,
        request: &RunRequest,
        clips: &ClipSlots,
    ) -> Result<RunResult> {
        let output = self
            .pipeline
            .run(&request.segments, clips, directory.path())
            .await?;

        let preview_path = directory.preview();
        let preview = match self
            .pipeline
            .transformer()
            .extract_frame(&output.final_video, &preview_path)
            .await
        {
            Ok(()) => Some(preview_path),
            Err(e) => {
                warn!("Could not create preview image: {}", e);
                None
            }
        };

        manifest.skipped_segments = output.skipped.clone();
        manifest.final_video = Some(output.final_video.clone());
        manifest.finished_at = Some(Utc::now());
        directory.write_manifest(manifest)?;

        info!("Run {} finished", directory.id());
        Ok(RunResult {
            directory,
            output,
            preview,
        })
    }
}
