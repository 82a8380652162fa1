//! Поиск ffmpeg/ffprobe и проверка их версий

use std::path::{Path, PathBuf};

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use tokio::process::Command;

use crate::config::MediaConfig;
use crate::error::{PipelineError, Result};

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:ffmpeg|ffprobe) version n?(\d+)(?:\.(\d+))?(?:\.(\d+))?")
        .expect("version pattern is valid")
});

/// Внешний инструмент и его версия
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalTool {
    pub name: String,
    pub path: PathBuf,
    pub version: Option<Version>,
    pub min_version: Version,
}

impl ExternalTool {
    /// Версия известна и не ниже минимальной.
    ///
    /// Builds without a parsable version (git snapshots) are accepted.
    pub fn is_supported(&self) -> bool {
        match &self.version {
            Some(version) => *version >= self.min_version,
            None => true,
        }
    }
}

/// Минимальная поддерживаемая версия ffmpeg
pub fn min_ffmpeg_version() -> Version {
    Version::new(4, 0, 0)
}

/// Разбирает версию из вывода `-version`
pub fn parse_version(output: &str) -> Option<Version> {
    let caps = VERSION_RE.captures(output)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(Version::new(part(1), part(2), part(3)))
}

/// Находит инструмент по имени или пути
pub fn locate(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|e| {
        PipelineError::Configuration(format!("{} not found: {}", program, e))
    })
}

async fn query_version(path: &Path) -> Result<Option<Version>> {
    let output = Command::new(path).arg("-version").output().await?;
    if !output.status.success() {
        return Err(PipelineError::Configuration(format!(
            "{} -version exited with {}",
            path.display(),
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = parse_version(&stdout);
    if version.is_none() {
        debug!("Could not parse version of {}", path.display());
    }
    Ok(version)
}

async fn inspect(name: &str, program: &str) -> Result<ExternalTool> {
    let path = locate(program)?;
    let version = query_version(&path).await?;
    info!(
        "Found {} at {} (version {})",
        name,
        path.display(),
        version
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );

    Ok(ExternalTool {
        name: name.to_string(),
        path,
        version,
        min_version: min_ffmpeg_version(),
    })
}

/// Проверяет, что ffmpeg и ffprobe доступны и достаточно свежие
pub async fn check_tools(config: &MediaConfig) -> Result<Vec<ExternalTool>> {
    let tools = vec![
        inspect("ffmpeg", &config.ffmpeg_path).await?,
        inspect("ffprobe", &config.ffprobe_path).await?,
    ];

    for tool in &tools {
        if !tool.is_supported() {
            return Err(PipelineError::Configuration(format!(
                "{} {} is older than required {}",
                tool.name,
                tool.version
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                tool.min_version
            )));
        }
    }

    Ok(tools)
}
