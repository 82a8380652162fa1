//! Итоговые длительности сегментов и файл субтитров

use std::collections::BTreeMap;
use std::path::Path;

use log::info;

use crate::config::TimingPolicy;
use crate::error::Result;
use crate::models::SegmentDurationRecord;
use crate::subtitle::{write_srt, SubtitleCue};

/// Считает целевые длительности сегментов.
///
/// Первый и последний сегмент (по номеру) получают меньшую добавку, остальные
/// большую. Сегмент без предложений тоже получает запись.
pub fn duration_records(
    raw_durations: &BTreeMap<u32, f64>,
    policy: &TimingPolicy,
) -> Vec<SegmentDurationRecord> {
    let last = raw_durations.len().saturating_sub(1);

    raw_durations
        .iter()
        .enumerate()
        .map(|(position, (&segment, &raw_duration))| {
            let is_edge = position == 0 || position == last;
            SegmentDurationRecord {
                segment,
                raw_duration,
                target_duration: raw_duration + policy.padding_for(is_edge),
            }
        })
        .collect()
}

/// Записывает субтитры и возвращает записи длительностей
pub fn aggregate(
    raw_durations: &BTreeMap<u32, f64>,
    cues: &[SubtitleCue],
    policy: &TimingPolicy,
    subtitle_path: &Path,
) -> Result<Vec<SegmentDurationRecord>> {
    let mut ordered = cues.to_vec();
    ordered.sort_by_key(|c| c.index);
    write_srt(subtitle_path, &ordered)?;
    info!(
        "Wrote {} subtitle cues to {}",
        ordered.len(),
        subtitle_path.display()
    );

    let records = duration_records(raw_durations, policy);
    for record in &records {
        info!(
            "Segment {}: narration {:.2}s, target {:.2}s",
            record.segment, record.raw_duration, record.target_duration
        );
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[(u32, f64)]) -> BTreeMap<u32, f64> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_inner_segment_padding() {
        let records = duration_records(
            &raw(&[(1, 1.0), (2, 5.0), (3, 1.0)]),
            &TimingPolicy::default(),
        );
        assert!((records[1].target_duration - 6.9).abs() < 1e-9);
        assert!((records[0].target_duration - 2.25).abs() < 1e-9);
        assert!((records[2].target_duration - 2.25).abs() < 1e-9);
    }

    #[test]
    fn test_five_segments_edges() {
        let records = duration_records(
            &raw(&[(1, 0.0), (2, 0.0), (3, 0.0), (4, 0.0), (5, 0.0)]),
            &TimingPolicy::default(),
        );
        let paddings: Vec<f64> = records.iter().map(|r| r.target_duration).collect();
        assert_eq!(paddings, vec![1.25, 1.9, 1.9, 1.9, 1.25]);
    }

    #[test]
    fn test_single_segment_is_edge() {
        let records = duration_records(&raw(&[(1, 3.0)]), &TimingPolicy::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_duration, 4.25);
    }

    #[test]
    fn test_aggregate_writes_sorted_cues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subtitles.srt");
        let cues = vec![
            SubtitleCue {
                index: 2,
                start: 2.3,
                end: 3.0,
                text: "Second.".to_string(),
            },
            SubtitleCue {
                index: 1,
                start: 0.0,
                end: 2.0,
                text: "First.".to_string(),
            },
        ];

        let records =
            aggregate(&raw(&[(1, 2.7)]), &cues, &TimingPolicy::default(), &path).unwrap();
        assert_eq!(records.len(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("1\n00:00:00,000 --> 00:00:02,000\nFirst.\n\n2\n"));
    }
}
