use std::sync::Arc;

use serde_json::json;

use super::fakes::*;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::generation::ClipSlots;
use crate::models::parse_script;
use crate::run::{list_runs, Orchestrator, RunGate, RunRequest};
use crate::VideoPipeline;

const SCRIPT: &str = r#"[
    {"video_script": "Water evaporates.", "video_prompt": "a lake at noon"},
    {"video_script": "It forms clouds. Rain follows.", "video_prompt": "clouds"}
]"#;

fn request() -> RunRequest {
    RunRequest {
        prompt: "Explain the water cycle".to_string(),
        segments: parse_script(SCRIPT).unwrap(),
        quiz: Some(json!({"questions": [{"q": "What forms clouds?"}]})),
    }
}

#[tokio::test]
async fn test_assemble_existing_persists_run() {
    let dir = tempfile::tempdir().unwrap();
    let slots = ClipSlots::new(dir.path().join("clips"));
    let request = request();
    for segment in &request.segments {
        write_clip(&slots.clip_path(segment), 3.0);
    }

    let transformer = Arc::new(FakeTransformer::default());
    let pipeline = VideoPipeline::new(
        PipelineConfig::default(),
        Box::new(FakeSynthesizer::new(&[])),
        Arc::new(FakeProbe),
        transformer.clone(),
    );
    let gate = RunGate::new();
    let runs_dir = dir.path().join("saved_videos");

    let result = Orchestrator::new(&pipeline, &gate, &runs_dir)
        .assemble_existing(&request, &slots)
        .await
        .unwrap();

    let run = &result.directory;
    assert_eq!(result.output.final_video, run.path().join("final_vid.mp4"));
    assert_eq!(result.preview, Some(run.preview()));
    assert_eq!(run.read_prompt().as_deref(), Some("Explain the water cycle"));
    assert_eq!(run.read_quiz().unwrap(), request.quiz);

    let manifest = run.read_manifest().unwrap().unwrap();
    assert_eq!(manifest.segments, 2);
    assert!(manifest.finished_at.is_some());
    assert_eq!(manifest.final_video, Some(result.output.final_video.clone()));

    assert!(!gate.in_progress());
    let listed = list_runs(&runs_dir).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, run.id());
}

#[tokio::test]
async fn test_busy_gate_rejects_second_run() {
    let dir = tempfile::tempdir().unwrap();
    let transformer = Arc::new(FakeTransformer::default());
    let pipeline = VideoPipeline::new(
        PipelineConfig::default(),
        Box::new(FakeSynthesizer::new(&[])),
        Arc::new(FakeProbe),
        transformer.clone(),
    );
    let gate = RunGate::new();
    let _permit = gate.try_begin().unwrap();

    let result = Orchestrator::new(&pipeline, &gate, dir.path())
        .assemble_existing(&request(), &ClipSlots::new(dir.path().join("clips")))
        .await;

    assert!(matches!(result, Err(PipelineError::RunInProgress)));
    // каталог запуска не создаётся
    assert!(list_runs(dir.path()).unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_run_releases_gate() {
    let dir = tempfile::tempdir().unwrap();
    let transformer = Arc::new(FakeTransformer::default());
    let pipeline = VideoPipeline::new(
        PipelineConfig::default(),
        Box::new(FakeSynthesizer::new(&[])),
        Arc::new(FakeProbe),
        transformer.clone(),
    );
    let gate = RunGate::new();

    // клипов нет, сборка невозможна
    let result = Orchestrator::new(&pipeline, &gate, dir.path().join("runs"))
        .assemble_existing(&request(), &ClipSlots::new(dir.path().join("clips")))
        .await;

    assert!(matches!(result, Err(PipelineError::Concatenation(_))));
    assert!(!gate.in_progress());
}
