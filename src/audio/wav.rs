use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::error::{Result, RevoiceError};
use crate::segment::AudioClip;

/// Read a WAV file as mono f32 samples.
pub fn read_wav(path: &Path) -> Result<AudioClip> {
    if !path.exists() {
        return Err(RevoiceError::FileNotFound(path.display().to_string()));
    }
    let reader = WavReader::open(path)?;
    decode(reader)
}

/// Decode an in-memory WAV payload (e.g. an HTTP response body).
pub fn decode_wav_bytes(bytes: &[u8]) -> Result<AudioClip> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    decode(reader)
}

fn decode<R: Read>(reader: WavReader<R>) -> Result<AudioClip> {
    let spec = reader.spec();
    debug!(
        "Decoding WAV: {} Hz, {} channels, {} bits, {:?}",
        spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioClip::new(samples, spec.sample_rate))
}

/// Write mono samples as 16-bit PCM, clamping to [-1, 1].
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;

    debug!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}

/// Duration of a WAV file in seconds, from its header.
pub fn wav_duration(path: &Path) -> Result<f64> {
    if !path.exists() {
        return Err(RevoiceError::FileNotFound(path.display().to_string()));
    }
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(RevoiceError::AudioExtraction(format!(
            "WAV file {} reports a zero sample rate",
            path.display()
        )));
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_preserves_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.wav");
        let samples: Vec<f32> = (0..1600).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();

        write_wav(&path, &samples, 16000).unwrap();
        let clip = read_wav(&path).unwrap();

        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.len(), samples.len());
        for (a, b) in clip.samples.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-3);
        }
        assert!((wav_duration(&path).unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_write_clamps_out_of_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loud.wav");
        write_wav(&path, &[2.0, -2.0], 8000).unwrap();
        let clip = read_wav(&path).unwrap();
        assert!(clip.samples[0] <= 1.0 && clip.samples[0] > 0.99);
        assert!(clip.samples[1] >= -1.0 && clip.samples[1] < -0.99);
    }

    #[test]
    fn test_decode_stereo_mixes_down() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let spec = WavSpec {
                channels: 2,
                sample_rate: 22050,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            };
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..10 {
                writer.write_sample(i16::MAX).unwrap();
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let clip = decode_wav_bytes(cursor.get_ref()).unwrap();
        assert_eq!(clip.sample_rate, 22050);
        assert_eq!(clip.len(), 10);
        assert!((clip.samples[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_duration_counts_frames_not_samples() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..(2 * 12000) {
            writer.write_sample(100i16).unwrap();
        }
        writer.finalize().unwrap();

        assert!((wav_duration(&path).unwrap() - 1.5).abs() < 1e-9);
        assert_eq!(
            wav_duration(&path).unwrap(),
            read_wav(&path).unwrap().duration_secs()
        );
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_wav(Path::new("/nonexistent/clip.wav"));
        assert!(matches!(result, Err(RevoiceError::FileNotFound(_))));
    }

    #[test]
    fn test_garbage_bytes_are_an_error() {
        assert!(decode_wav_bytes(b"definitely not a wav").is_err());
    }
}
