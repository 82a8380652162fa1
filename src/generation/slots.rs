//! Раскладка исходных клипов по слотам хранилища

use std::path::{Path, PathBuf};

use crate::models::Segment;

const CLIP_FILE_NAME: &str = "output.mp4";

/// Хранилище сгенерированных клипов: `<root>/video_NNN/output.mp4`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSlots {
    root: PathBuf,
}

impl ClipSlots {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Каталог слота
    pub fn slot_dir(&self, slot: u32) -> PathBuf {
        self.root.join(format!("video_{:03}", slot))
    }

    /// Ожидаемый путь клипа сегмента (slot = ordinal - 1)
    pub fn clip_path(&self, segment: &Segment) -> PathBuf {
        self.slot_dir(segment.slot()).join(CLIP_FILE_NAME)
    }

    /// Путь клипа: явно заданный в сегменте или из слота
    pub fn source_for(&self, segment: &Segment) -> PathBuf {
        segment
            .raw_clip
            .clone()
            .unwrap_or_else(|| self.clip_path(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_layout() {
        let slots = ClipSlots::new("/clips");
        let segment = Segment::new(1, "Intro.", "a sunrise");
        assert_eq!(slots.clip_path(&segment), PathBuf::from("/clips/video_000/output.mp4"));

        let segment = Segment::new(12, "", "");
        assert_eq!(slots.slot_dir(segment.slot()), PathBuf::from("/clips/video_011"));
    }

    #[test]
    fn test_explicit_clip_wins() {
        let slots = ClipSlots::new("/clips");
        let mut segment = Segment::new(2, "", "");
        segment.raw_clip = Some(PathBuf::from("/elsewhere/two.mp4"));
        assert_eq!(slots.source_for(&segment), PathBuf::from("/elsewhere/two.mp4"));
    }
}
