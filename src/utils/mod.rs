//! Вспомогательные модули

pub mod ffmpeg;
pub mod logger;
pub mod workspace;

pub use ffmpeg::{check_tools, ExternalTool};
pub use logger::init_logger;
pub use workspace::RunWorkspace;
