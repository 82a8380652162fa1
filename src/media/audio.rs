//! Декодирование, ресемплинг и сборка аудиодорожки озвучки
//!
//! Длительность озвучки измеряется по декодированным семплам, а не по
//! метаданным контейнера. Та же длительность используется и для субтитров,
//! и для общей дорожки, поэтому они не расходятся.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info, warn};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::config::TimingPolicy;
use crate::error::{PipelineError, Result};
use crate::models::NarrationClip;

const RESAMPLE_CHUNK: usize = 1024;

/// Моно PCM в формате f32
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Длительность в секундах
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Декодирует аудио в моно PCM.
///
/// `extension` подсказывает формат: WAV читается через hound, остальное
/// через symphonia.
pub fn decode_audio(data: &[u8], extension: &str) -> Result<DecodedAudio> {
    if extension.eq_ignore_ascii_case("wav") {
        return decode_wav(data);
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(extension);

    let format_opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &MetadataOptions::default())
        .map_err(|e| PipelineError::AudioProcessing(format!("Unrecognized audio format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::AudioProcessing("No audio track found".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::AudioProcessing(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        let channels = spec.channels.count().max(1);

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_planar_ref(decoded);
        let planar = buffer.samples();

        if channels == 1 {
            samples.extend_from_slice(planar);
        } else {
            let frames = planar.len() / channels;
            for frame in 0..frames {
                let sum: f32 = (0..channels).map(|ch| planar[ch * frames + frame]).sum();
                samples.push(sum / channels as f32);
            }
        }
    }

    if sample_rate == 0 {
        return Err(PipelineError::AudioProcessing(
            "Audio stream has no sample rate".to_string(),
        ));
    }

    debug!(
        "Decoded {} samples at {} Hz ({:.3}s)",
        samples.len(),
        sample_rate,
        samples.len() as f64 / sample_rate as f64
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Декодирует аудиофайл, определяя формат по расширению
pub fn decode_audio_file(path: &Path) -> Result<DecodedAudio> {
    let data = std::fs::read(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    decode_audio(&data, extension)
}

fn decode_wav(data: &[u8]) -> Result<DecodedAudio> {
    let reader = WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Меняет частоту дискретизации через sinc-интерполяцию
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let expected_len = (input.len() as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| PipelineError::AudioProcessing(format!("Failed to init resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected_len + delay + RESAMPLE_CHUNK * 2);

    let mut idx = 0;
    while output.len() < expected_len + delay {
        let mut chunk = vec![0.0f32; RESAMPLE_CHUNK];
        if idx < input.len() {
            let end = (idx + RESAMPLE_CHUNK).min(input.len());
            chunk[..end - idx].copy_from_slice(&input[idx..end]);
        }
        idx += RESAMPLE_CHUNK;

        let processed = resampler
            .process(&[chunk], None)
            .map_err(|e| PipelineError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&processed[0]);
    }

    let end = (delay + expected_len).min(output.len());
    Ok(output[delay..end].to_vec())
}

/// Тишина заданной длительности
pub fn silence(seconds: f64, sample_rate: u32) -> Vec<f32> {
    let len = (seconds.max(0.0) * sample_rate as f64).round() as usize;
    vec![0.0; len]
}

/// Записывает моно WAV (16 бит)
pub fn encode_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Собирает общую дорожку озвучки.
///
/// Клипы упорядочиваются по (сегмент, предложение), между ними вставляются
/// паузы по той же политике, что и при расчёте субтитров. Частота
/// дискретизации берётся у первого клипа. Возвращает длительность дорожки.
pub fn combine_narration(
    clips: &[NarrationClip],
    policy: &TimingPolicy,
    output: &Path,
) -> Result<f64> {
    let mut ordered: Vec<&NarrationClip> = clips.iter().collect();
    ordered.sort_by_key(|c| (c.segment, c.sentence));

    let mut combined: Vec<f32> = Vec::new();
    let mut sample_rate: Option<u32> = None;
    let mut previous: Option<u32> = None;

    for clip in ordered {
        let decoded = decode_audio_file(&clip.path)?;
        let rate = *sample_rate.get_or_insert(decoded.sample_rate);

        let gap = policy.gap_before(previous, clip.segment);
        combined.extend(silence(gap, rate));

        let samples = resample(&decoded.samples, decoded.sample_rate, rate)?;
        combined.extend_from_slice(&samples);
        previous = Some(clip.segment);
    }

    let rate = sample_rate.ok_or_else(|| {
        PipelineError::AudioProcessing("No narration clips to combine".to_string())
    })?;

    encode_wav(output, &combined, rate)?;

    let duration = combined.len() as f64 / rate as f64;
    info!(
        "Combined narration written to {} ({:.2}s)",
        output.display(),
        duration
    );
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(seconds: f64, sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            let frames = (seconds * sample_rate as f64).round() as usize;
            for i in 0..frames * channels as usize {
                writer.write_sample(((i % 100) as i16) * 100).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_wav_duration() {
        let decoded = decode_audio(&wav_bytes(1.5, 8000, 1), "wav").unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.samples.len(), 12000);
        assert!((decoded.duration() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_stereo_mixes_down() {
        let decoded = decode_audio(&wav_bytes(0.5, 8000, 2), "wav").unwrap();
        assert_eq!(decoded.samples.len(), 4000);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_audio(b"definitely not audio", "mp3").is_err());
        assert!(decode_audio(b"RIFF", "wav").is_err());
    }

    #[test]
    fn test_resample_preserves_duration() {
        let input = vec![0.1f32; 8000];
        let output = resample(&input, 8000, 16000).unwrap();
        assert_eq!(output.len(), 16000);

        let same = resample(&input, 8000, 8000).unwrap();
        assert_eq!(same.len(), 8000);
    }

    #[test]
    fn test_silence_length() {
        assert_eq!(silence(0.3, 8000).len(), 2400);
        assert_eq!(silence(-1.0, 8000).len(), 0);
    }

    #[test]
    fn test_combine_narration_inserts_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let mut clips = Vec::new();
        for (segment, sentence, seconds) in [(2u32, 0usize, 1.0), (1, 1, 0.5), (1, 0, 1.0)] {
            let path = dir.path().join(format!("s{}_{}.wav", segment, sentence));
            std::fs::write(&path, wav_bytes(seconds, 8000, 1)).unwrap();
            clips.push(NarrationClip {
                segment,
                sentence,
                path,
                duration: seconds,
            });
        }

        let output = dir.path().join("combined.wav");
        let duration = combine_narration(&clips, &TimingPolicy::default(), &output).unwrap();

        // 1.0 + 0.3 + 0.5 + 1.3 + 1.0
        assert!((duration - 4.1).abs() < 1e-6);
        let written = decode_audio_file(&output).unwrap();
        assert_eq!(written.samples.len(), 32800);
    }

    #[test]
    fn test_combine_without_clips_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = combine_narration(&[], &TimingPolicy::default(), &dir.path().join("x.wav"));
        assert!(matches!(result, Err(PipelineError::AudioProcessing(_))));
    }
}
