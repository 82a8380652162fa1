//! Модуль для работы с субтитрами в формате SRT

pub mod srt;

pub use srt::{format_srt_time, parse_srt, to_srt, write_srt, SubtitleCue};
