//! Реализация медиа-трейтов поверх ffmpeg и ffprobe

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;
use tokio::process::Command;

use super::{MediaError, MediaProbe, MediaTransformer};
use crate::config::MediaConfig;

/// Вызовы ffmpeg/ffprobe через командную строку
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg: String,
    ffprobe: String,
    subtitle_style: String,
    video_codec: String,
    audio_codec: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl FfmpegTools {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            subtitle_style: config.subtitle_style.clone(),
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
        }
    }

    async fn run(&self, tool: &str, args: &[String]) -> Result<Vec<u8>, MediaError> {
        debug!("Running {} {}", tool, args.join(" "));

        let output = Command::new(tool)
            .args(args)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: tool.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::CommandFailed {
                tool: tool.to_string(),
                status: output.status.to_string(),
                stderr: tail(&stderr, 20),
            });
        }

        Ok(output.stdout)
    }

    async fn run_ffmpeg(&self, args: Vec<String>) -> Result<(), MediaError> {
        self.run(&self.ffmpeg, &args).await.map(|_| ())
    }

    fn stretch_args(&self, input: &Path, output: &Path, factor: f64, target: f64) -> Vec<String> {
        vec![
            "-y".into(),
            "-i".into(),
            path_arg(input),
            "-filter:v".into(),
            format!("setpts={:.6}*PTS", factor),
            "-an".into(),
            "-c:v".into(),
            self.video_codec.clone(),
            "-t".into(),
            format!("{:.3}", target),
            path_arg(output),
        ]
    }

    fn subtitle_filter(&self, subtitles: &Path) -> String {
        format!(
            "subtitles={}:force_style='{}'",
            escape_filter_value(&path_arg(subtitles)),
            self.subtitle_style
        )
    }

    fn mux_args(&self, video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-i".into(),
            path_arg(video),
            "-i".into(),
            path_arg(audio),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            self.audio_codec.clone(),
            path_arg(output),
        ]
    }
}

#[async_trait::async_trait]
impl MediaProbe for FfmpegTools {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path_arg(path),
        ];
        let stdout = self.run(&self.ffprobe, &args).await?;
        parse_probe_duration(&stdout)
    }
}

#[async_trait::async_trait]
impl MediaTransformer for FfmpegTools {
    async fn time_stretch(
        &self,
        input: &Path,
        output: &Path,
        factor: f64,
        target: f64,
    ) -> Result<(), MediaError> {
        info!(
            "Stretching {} by {:.3} to {:.2}s",
            input.display(),
            factor,
            target
        );
        self.run_ffmpeg(self.stretch_args(input, output, factor, target))
            .await
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        let list_path = output.with_extension("txt");
        tokio::fs::write(&list_path, concat_list(inputs)).await?;

        let args = vec![
            "-y".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            path_arg(&list_path),
            "-an".into(),
            "-c:v".into(),
            "copy".into(),
            path_arg(output),
        ];
        let result = self.run_ffmpeg(args).await;
        let _ = tokio::fs::remove_file(&list_path).await;
        result
    }

    async fn overlay_subtitles(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
    ) -> Result<(), MediaError> {
        let args = vec![
            "-y".into(),
            "-i".into(),
            path_arg(video),
            "-vf".into(),
            self.subtitle_filter(subtitles),
            "-c:a".into(),
            "copy".into(),
            path_arg(output),
        ];
        self.run_ffmpeg(args).await
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MediaError> {
        self.run_ffmpeg(self.mux_args(video, audio, output)).await
    }

    async fn extract_frame(&self, video: &Path, output: &Path) -> Result<(), MediaError> {
        let args = vec![
            "-y".into(),
            "-i".into(),
            path_arg(video),
            "-frames:v".into(),
            "1".into(),
            path_arg(output),
        ];
        self.run_ffmpeg(args).await
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Длительность из JSON-вывода ffprobe
fn parse_probe_duration(stdout: &[u8]) -> Result<f64, MediaError> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout).map_err(|e| {
        MediaError::InvalidOutput(format!("Failed to parse ffprobe output: {}", e))
    })?;

    let raw = parsed
        .format
        .duration
        .ok_or_else(|| MediaError::InvalidOutput("ffprobe reported no duration".to_string()))?;

    raw.trim()
        .parse::<f64>()
        .map_err(|_| MediaError::InvalidOutput(format!("Failed to parse duration: {}", raw)))
}

/// Экранирование значения для фильтра ffmpeg
fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | ':' | '\'' | ',' | '[' | ']' | ';' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Содержимое списка для concat-демультиплексора
fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| format!("file '{}'\n", path_arg(p).replace('\'', "'\\''")))
        .collect()
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> FfmpegTools {
        FfmpegTools::new(&MediaConfig::default())
    }

    #[test]
    fn test_parse_probe_duration() {
        let json = br#"{"format": {"duration": "4.000000"}}"#;
        assert_eq!(parse_probe_duration(json).unwrap(), 4.0);

        let missing = br#"{"format": {}}"#;
        assert!(parse_probe_duration(missing).is_err());

        assert!(parse_probe_duration(b"not json").is_err());
    }

    #[test]
    fn test_stretch_args() {
        let args = tools().stretch_args(Path::new("in.mp4"), Path::new("out.mp4"), 1.725, 6.9);
        assert!(args.contains(&"setpts=1.725000*PTS".to_string()));
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"6.900".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_subtitle_filter_escapes_path() {
        let filter = tools().subtitle_filter(Path::new("/tmp/run:1/subs.srt"));
        assert_eq!(
            filter,
            "subtitles=/tmp/run\\:1/subs.srt:force_style='BackColour=&HFF000000,BorderStyle=3'"
        );
    }

    #[test]
    fn test_mux_copies_video_and_encodes_audio() {
        let args = tools().mux_args(Path::new("v.mp4"), Path::new("a.wav"), Path::new("o.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v copy"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-map 1:a:0"));
    }

    #[test]
    fn test_concat_list_quotes_paths() {
        let list = concat_list(&[PathBuf::from("/a/one.mp4"), PathBuf::from("/b/it's.mp4")]);
        assert_eq!(list, "file '/a/one.mp4'\nfile '/b/it'\\''s.mp4'\n");
    }
}
