//! Разбиение текста озвучки на предложения
//!
//! Каждое предложение синтезируется отдельно, поэтому разбиение определяет
//! и число запросов к TTS, и число субтитров.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::SentenceUnit;

// Фрагмент до точки включительно либо хвост без точки
static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.]+\.?").expect("sentence pattern is valid"));

/// Делит текст на предложения, сохраняя порядок.
///
/// Fragments are trimmed; fragments with no content besides the terminator are
/// dropped; every emitted sentence ends with a period.
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_RE
        .find_iter(text)
        .filter_map(|m| {
            let fragment = m.as_str().trim();
            let body = fragment.trim_end_matches('.').trim();
            if body.is_empty() {
                return None;
            }
            if fragment.ends_with('.') {
                Some(fragment.to_string())
            } else {
                Some(format!("{}.", fragment))
            }
        })
        .collect()
}

/// Предложения сегмента с индексами внутри сегмента
pub fn sentence_units(segment: u32, text: &str) -> Vec<SentenceUnit> {
    split_sentences(text)
        .into_iter()
        .enumerate()
        .map(|(index, text)| SentenceUnit {
            segment,
            index,
            text,
        })
        .collect()
}
