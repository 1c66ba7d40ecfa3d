use base64::Engine;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, thiserror::Error)]
pub enum PcmError {
    #[error("audio payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("PCM16 payload has an odd byte count ({0})")]
    OddLength(usize),
}

/// Converts a slice of f32 samples in `[-1.0, 1.0]` to signed 16-bit samples.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Converts signed 16-bit samples to f32 samples in `[-1.0, 1.0]`.
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| (s as f32 / 32768.0).clamp(-1.0, 1.0))
        .collect()
}

/// A trait for converting audio sample types to little-endian PCM16 bytes.
pub trait ToBinary {
    fn to_binary(&self) -> Vec<u8>;
}

impl ToBinary for [i16] {
    fn to_binary(&self) -> Vec<u8> {
        self.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

impl ToBinary for [f32] {
    fn to_binary(&self) -> Vec<u8> {
        f32_to_i16(self).to_binary()
    }
}

/// Interprets little-endian PCM16 bytes as f32 samples.
pub fn pcm16_bytes_to_f32(bytes: &[u8]) -> Result<Vec<f32>, PcmError> {
    if bytes.len() % 2 != 0 {
        return Err(PcmError::OddLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| (i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0).clamp(-1.0, 1.0))
        .collect())
}

/// Encodes f32 samples as base64 PCM16, the wire format of the live endpoint.
pub fn encode_base64(samples: &[f32]) -> String {
    STANDARD.encode(samples.to_binary())
}

/// Decodes a base64 PCM16 fragment into f32 samples.
pub fn decode_base64(fragment: &str) -> Result<Vec<f32>, PcmError> {
    let bytes = STANDARD.decode(fragment)?;
    pcm16_bytes_to_f32(&bytes)
}

/// Root-mean-square energy of a frame. Empty frames are silent.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.iter().map(|s| s * s).sum();
    (sum / frame.len() as f32).sqrt()
}

/// Playback length of `sample_count` mono samples at `sample_rate`, in seconds.
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / sample_rate as f64
}

/// Averages interleaved multi-channel audio down to mono.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|c| c.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_restores_encoded_samples_within_quantization() {
        let samples = [0.0, 0.5, -0.5, 0.999];
        let decoded = decode_base64(&encode_base64(&samples)).unwrap();
        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < 1.0 / 16384.0, "{a} vs {b}");
        }
    }

    #[test]
    fn odd_length_payload_is_rejected() {
        let err = pcm16_bytes_to_f32(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, PcmError::OddLength(3)));
    }

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        assert!((rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn downmix_averages_stereo_pairs() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
    }

    #[test]
    fn clipping_saturates_instead_of_wrapping() {
        assert_eq!(f32_to_i16(&[2.0, -2.0]), vec![i16::MAX, i16::MIN]);
    }
}
