use crate::pcm::{downmix, f32_to_i16};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("wav i/o failed: {0}")]
    Hound(#[from] hound::Error),
    #[error("unsupported wav format: {bits}-bit {format:?}")]
    Unsupported { bits: u16, format: SampleFormat },
}

/// Reads a WAV file and returns its audio downmixed to mono with the file's
/// sample rate.
pub fn read_mono(path: &Path) -> Result<(Vec<f32>, u32), WavError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 24 | 32) => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => return Err(WavError::Unsupported { bits, format }),
    };

    tracing::debug!(
        "read {} samples ({} ch, {} Hz) from {}",
        interleaved.len(),
        spec.channels,
        spec.sample_rate,
        path.display()
    );
    Ok((downmix(&interleaved, spec.channels as usize), spec.sample_rate))
}

/// Writes mono f32 samples as a 16-bit PCM WAV file.
pub fn write_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), WavError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for sample in f32_to_i16(samples) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_file_reads_back_as_mono_with_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..480).map(|i| (i as f32 / 480.0) - 0.5).collect();

        write_mono(&path, &samples, 24_000).unwrap();
        let (read, rate) = read_mono(&path).unwrap();

        assert_eq!(rate, 24_000);
        assert_eq!(read.len(), samples.len());
        assert!((read[100] - samples[100]).abs() < 1e-3);
    }
}
