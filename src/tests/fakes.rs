//! Заглушки внешних сервисов для тестов конвейера

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::media::{MediaError, MediaProbe, MediaTransformer};
use crate::tts::{AudioFormat, SpeechSynthesizer, SynthesizedAudio, TtsError};

pub const SAMPLE_RATE: u32 = 8000;

/// WAV с тоном заданной длительности
pub fn wav_bytes(seconds: f64) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (seconds * SAMPLE_RATE as f64).round() as usize;
        for i in 0..frames {
            writer.write_sample((((i % 40) as i16) - 20) * 500).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Синтезатор, возвращающий WAV заданной длительности для каждого текста
pub struct FakeSynthesizer {
    durations: HashMap<String, f64>,
    default_duration: f64,
    failing_text: Option<String>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeSynthesizer {
    pub fn new(durations: &[(&str, f64)]) -> Self {
        Self {
            durations: durations
                .iter()
                .map(|(text, d)| (text.to_string(), *d))
                .collect(),
            default_duration: 1.0,
            failing_text: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing_text = Some(text.to_string());
        self
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, TtsError> {
        self.requests.lock().unwrap().push(text.to_string());

        if self.failing_text.as_deref() == Some(text) {
            return Err(TtsError::Api {
                status: 500,
                message: "voice unavailable".to_string(),
            });
        }

        let seconds = self
            .durations
            .get(text)
            .copied()
            .unwrap_or(self.default_duration);
        Ok(SynthesizedAudio {
            data: Bytes::from(wav_bytes(seconds)),
            format: AudioFormat::Wav,
        })
    }
}

/// Создаёт «клип», длительность которого записана в файле текстом
pub fn write_clip(path: &Path, seconds: f64) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, seconds.to_string()).unwrap();
}

/// Читает длительность из содержимого файла
pub struct FakeProbe;

#[async_trait::async_trait]
impl MediaProbe for FakeProbe {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let content = tokio::fs::read_to_string(path).await?;
        content
            .trim()
            .parse::<f64>()
            .map_err(|_| MediaError::InvalidOutput(format!("unreadable clip {}", path.display())))
    }
}

/// Вызов преобразования
#[derive(Debug, Clone, PartialEq)]
pub enum TransformCall {
    Stretch {
        input: PathBuf,
        factor: f64,
        target: f64,
    },
    Concat(Vec<PathBuf>),
    Overlay {
        video: PathBuf,
        subtitles: PathBuf,
    },
    Mux {
        video: PathBuf,
        audio: PathBuf,
    },
    Frame,
}

/// Записывает заглушки вместо видео и запоминает вызовы
#[derive(Default)]
pub struct FakeTransformer {
    pub calls: Mutex<Vec<TransformCall>>,
    pub fail_mux: bool,
    pub fail_stretch: bool,
}

impl FakeTransformer {
    pub fn calls(&self) -> Vec<TransformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stretches(&self) -> Vec<(PathBuf, f64, f64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransformCall::Stretch {
                    input,
                    factor,
                    target,
                } => Some((input, factor, target)),
                _ => None,
            })
            .collect()
    }

    pub fn concat_inputs(&self) -> Option<Vec<PathBuf>> {
        self.calls().into_iter().find_map(|call| match call {
            TransformCall::Concat(inputs) => Some(inputs),
            _ => None,
        })
    }

    fn failed(tool: &str) -> MediaError {
        MediaError::CommandFailed {
            tool: tool.to_string(),
            status: "exit status: 1".to_string(),
            stderr: "simulated failure".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl MediaTransformer for FakeTransformer {
    async fn time_stretch(
        &self,
        input: &Path,
        output: &Path,
        factor: f64,
        target: f64,
    ) -> Result<(), MediaError> {
        self.calls.lock().unwrap().push(TransformCall::Stretch {
            input: input.to_path_buf(),
            factor,
            target,
        });
        if self.fail_stretch {
            return Err(Self::failed("ffmpeg"));
        }
        tokio::fs::write(output, target.to_string()).await?;
        Ok(())
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        self.calls
            .lock()
            .unwrap()
            .push(TransformCall::Concat(inputs.to_vec()));
        tokio::fs::write(output, b"concatenated").await?;
        Ok(())
    }

    async fn overlay_subtitles(
        &self,
        video: &Path,
        subtitles: &Path,
        output: &Path,
    ) -> Result<(), MediaError> {
        self.calls.lock().unwrap().push(TransformCall::Overlay {
            video: video.to_path_buf(),
            subtitles: subtitles.to_path_buf(),
        });
        tokio::fs::write(output, b"subtitled").await?;
        Ok(())
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MediaError> {
        self.calls.lock().unwrap().push(TransformCall::Mux {
            video: video.to_path_buf(),
            audio: audio.to_path_buf(),
        });
        if self.fail_mux {
            return Err(Self::failed("ffmpeg"));
        }
        tokio::fs::write(output, b"final video").await?;
        Ok(())
    }

    async fn extract_frame(&self, _video: &Path, output: &Path) -> Result<(), MediaError> {
        self.calls.lock().unwrap().push(TransformCall::Frame);
        tokio::fs::write(output, b"jpeg").await?;
        Ok(())
    }
}
