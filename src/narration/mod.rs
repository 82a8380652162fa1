//! Озвучка: разбиение на предложения, тайминги и длительности сегментов

pub mod aggregator;
pub mod segmenter;
pub mod timer;

pub use aggregator::{aggregate, duration_records};
pub use segmenter::{sentence_units, split_sentences};
pub use timer::{NarrationTimeline, NarrationTimer, TimelineCursor};
