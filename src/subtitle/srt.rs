use std::fmt::Write as _;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Один субтитр
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    /// Порядковый номер (с единицы)
    pub index: usize,
    /// Время начала в секундах
    pub start: f64,
    /// Время окончания в секундах
    pub end: f64,
    pub text: String,
}

impl SubtitleCue {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Форматирует секунды как `HH:MM:SS,mmm`
pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Парсит время из строки формата `HH:MM:SS,mmm`
pub fn parse_srt_time(timestamp: &str) -> Result<f64> {
    let invalid = || PipelineError::InvalidScript(format!("Invalid SRT timestamp: {}", timestamp));

    let (hms, millis) = timestamp.trim().split_once(',').ok_or_else(invalid)?;
    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let seconds: u64 = parts[2].parse().map_err(|_| invalid())?;
    let millis: u64 = millis.parse().map_err(|_| invalid())?;

    let total_ms = hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis;
    Ok(total_ms as f64 / 1000.0)
}

/// Сериализует субтитры в формат SRT
pub fn to_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for cue in cues {
        // запись в String не может завершиться ошибкой
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_srt_time(cue.start),
            format_srt_time(cue.end),
            cue.text
        );
    }
    out
}

/// Записывает файл субтитров
pub fn write_srt(path: &Path, cues: &[SubtitleCue]) -> Result<()> {
    std::fs::write(path, to_srt(cues))?;
    Ok(())
}

/// Разбирает содержимое SRT-файла
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleCue>> {
    let mut cues = Vec::new();
    let normalized = content.replace("\r\n", "\n");

    for block in normalized.split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());
        let Some(index_line) = lines.next() else {
            continue;
        };
        let index: usize = index_line.trim().parse().map_err(|_| {
            PipelineError::InvalidScript(format!("Invalid SRT cue index: {}", index_line))
        })?;

        let range = lines.next().ok_or_else(|| {
            PipelineError::InvalidScript(format!("SRT cue {} has no time range", index))
        })?;
        let (start, end) = range.split_once("-->").ok_or_else(|| {
            PipelineError::InvalidScript(format!("Invalid SRT time range: {}", range))
        })?;

        let text = lines.collect::<Vec<_>>().join("\n");
        cues.push(SubtitleCue {
            index,
            start: parse_srt_time(start)?,
            end: parse_srt_time(end)?,
            text,
        });
    }

    Ok(cues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(2.9), "00:00:02,900");
        assert_eq!(format_srt_time(61.25), "00:01:01,250");
        assert_eq!(format_srt_time(3723.0456), "01:02:03,046");
    }

    #[test]
    fn test_parse_srt_time() {
        assert_eq!(parse_srt_time("00:01:23,456").unwrap(), 83.456);
        assert!(parse_srt_time("00:01:23.456").is_err());
    }

    #[test]
    fn test_to_srt_layout() {
        let cues = vec![
            SubtitleCue { index: 1, start: 0.0, end: 2.0, text: "Hello.".to_string() },
            SubtitleCue { index: 2, start: 2.3, end: 5.3, text: "World.".to_string() },
        ];
        assert_eq!(
            to_srt(&cues),
            "1\n00:00:00,000 --> 00:00:02,000\nHello.\n\n2\n00:00:02,300 --> 00:00:05,300\nWorld.\n\n"
        );
    }

    #[test]
    fn test_parse_written_file() {
        let content = "1\n00:00:00,000 --> 00:00:02,000\nHello.\n\n2\n00:00:03,300 --> 00:00:04,000\nBye.\n\n";
        let cues = parse_srt(content).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[1].index, 2);
        assert_eq!(cues[1].start, 3.3);
        assert_eq!(cues[1].text, "Bye.");
    }
}
