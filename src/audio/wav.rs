//! WAV encoding of captured audio.

use crate::error::{KiraError, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Sink for captured PCM frames.
///
/// Owned exclusively by one capture session; `finish` closes the backing file.
pub trait FrameEncoder: Send {
    /// Append interleaved 16-bit samples.
    fn write_frames(&mut self, samples: &[i16]) -> Result<()>;

    /// Flush headers and close the output.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Encoder writing 16-bit integer PCM WAV through `hound`.
pub struct WavEncoder {
    writer: hound::WavWriter<BufWriter<File>>,
    path: PathBuf,
}

impl WavEncoder {
    /// Create (or truncate) the file at `path`.
    ///
    /// # Errors
    /// Returns `KiraError::AudioEncode` if the file cannot be created.
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(path, spec).map_err(|e| KiraError::AudioEncode {
            message: format!("Failed to create {}: {}", path.display(), e),
        })?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameEncoder for WavEncoder {
    fn write_frames(&mut self, samples: &[i16]) -> Result<()> {
        for &sample in samples {
            self.writer
                .write_sample(sample)
                .map_err(|e| KiraError::AudioEncode {
                    message: format!("Failed to write sample: {}", e),
                })?;
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let Self { writer, path } = *self;
        writer.finalize().map_err(|e| KiraError::AudioEncode {
            message: format!("Failed to finalize {}: {}", path.display(), e),
        })
    }
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn wav_encoder_round_trips_samples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture.wav");

        let mut encoder = Box::new(WavEncoder::create(&path, 44_100, 1).unwrap());
        encoder.write_frames(&[1, -2, 3]).unwrap();
        encoder.write_frames(&[4]).unwrap();
        encoder.finish().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 44_100);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, -2, 3, 4]);
    }

    #[test]
    fn wav_encoder_reports_uncreatable_path() {
        let result = WavEncoder::create(Path::new("/nonexistent/dir/capture.wav"), 44_100, 1);
        assert!(matches!(result, Err(KiraError::AudioEncode { .. })));
    }

    #[test]
    fn resample_identity_same_rate() {
        let samples = vec![100i16, 200, 300, 400, 500];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn resample_upsample_verification() {
        let samples = vec![0i16, 1000, 2000];
        let resampled = resample(&samples, 8000, 16000);

        assert_eq!(resampled.len(), 6);
        assert_eq!(resampled[0], 0);
        assert!(resampled[1] > 0 && resampled[1] < 1000);
        assert_eq!(resampled[2], 1000);
    }

    #[test]
    fn resample_handles_edge_cases() {
        assert!(resample(&[], 48000, 44100).is_empty());

        let single = resample(&[100i16], 16000, 8000);
        assert_eq!(single, vec![100]);
    }

    #[test]
    fn resample_preserves_signal_amplitude() {
        let samples = vec![1000i16; 100];
        let resampled = resample(&samples, 48000, 44100);
        assert!(resampled.iter().all(|&s| (999..=1001).contains(&s)));
    }
}
