use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use eduvid::config::PipelineConfig;
use eduvid::generation::ClipSlots;
use eduvid::models::parse_script;
use eduvid::run::{list_runs, Orchestrator, RunGate, RunRequest};
use eduvid::tts::synthesizer_from_config;
use eduvid::utils::{check_tools, init_logger};
use eduvid::VideoPipeline;

#[derive(Parser)]
#[command(name = "eduvid")]
#[command(about = "Assemble narrated educational videos from a script and generated clips", long_about = None)]
struct Cli {
    /// JSON-файл конфигурации
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Собрать видео из сценария и готовых клипов
    Assemble {
        /// JSON-массив записей с полями video_script и video_prompt
        #[arg(short, long)]
        script: PathBuf,
        /// Каталог со слотами video_NNN/output.mp4
        #[arg(long)]
        clips: PathBuf,
        /// Базовый каталог для сохранения запусков
        #[arg(short, long)]
        output: PathBuf,
        /// Промпт, из которого получен сценарий
        #[arg(short, long, default_value = "")]
        prompt: String,
        /// JSON-файл с тестом по видео
        #[arg(short, long)]
        quiz: Option<PathBuf>,
    },
    /// Проверить наличие и версии ffmpeg/ffprobe
    Check,
    /// Показать сохранённые запуски
    List {
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Assemble {
            script,
            clips,
            output,
            prompt,
            quiz,
        } => {
            config.validate()?;
            check_tools(&config.media).await?;

            let raw = std::fs::read_to_string(&script)
                .with_context(|| format!("Failed to read script {}", script.display()))?;
            let segments = parse_script(&raw)?;

            let quiz = match quiz {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read quiz {}", path.display()))?;
                    Some(serde_json::from_str(&raw).context("Quiz is not valid JSON")?)
                }
                None => None,
            };

            let synthesizer = synthesizer_from_config(&config.tts)?;
            let (tx, mut rx) = tokio::sync::mpsc::channel(32);
            let pipeline = VideoPipeline::with_ffmpeg(config, synthesizer).with_progress(tx);

            let reporter = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    info!("Progress: {:?}", update);
                }
            });

            let gate = RunGate::new();
            let orchestrator = Orchestrator::new(&pipeline, &gate, &output);
            let request = RunRequest {
                prompt,
                segments,
                quiz,
            };

            let result = orchestrator
                .assemble_existing(&request, &ClipSlots::new(clips))
                .await;

            drop(pipeline);
            let _ = reporter.await;

            match result {
                Ok(result) => {
                    if !result.output.skipped.is_empty() {
                        info!("Segments without clips: {:?}", result.output.skipped);
                    }
                    println!("{}", result.output.final_video.display());
                }
                Err(e) => {
                    error!("Run aborted at {} stage", e.stage());
                    return Err(e.into());
                }
            }
        }
        Command::Check => {
            for tool in check_tools(&config.media).await? {
                println!(
                    "{}: {} (version {})",
                    tool.name,
                    tool.path.display(),
                    tool.version
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                );
            }
        }
        Command::List { output } => {
            for run in list_runs(&output)? {
                let status = if run.final_video.is_some() {
                    "done"
                } else {
                    "incomplete"
                };
                println!(
                    "{}\t{}\t{}",
                    run.id,
                    status,
                    run.prompt.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
