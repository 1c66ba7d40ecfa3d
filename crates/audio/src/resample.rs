use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::collections::VecDeque;

#[derive(Debug, thiserror::Error)]
pub enum ResampleError {
    #[error("failed to construct resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),
    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

/// Creates a mono resampler converting `in_rate` to `out_rate`, consuming
/// `chunk_size` input frames per call.
pub fn create_resampler(
    in_rate: u32,
    out_rate: u32,
    chunk_size: usize,
) -> Result<FastFixedIn<f32>, ResampleError> {
    let resampler = FastFixedIn::<f32>::new(
        out_rate as f64 / in_rate as f64,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Resamples one whole buffer in a single pass.
pub fn convert(samples: &[f32], in_rate: u32, out_rate: u32) -> Result<Vec<f32>, ResampleError> {
    if in_rate == out_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(in_rate, out_rate, samples.len())?;
    let mut resampled = resampler.process(&[samples], None)?;
    Ok(resampled.pop().unwrap_or_default())
}

/// Turns an arbitrary stream of mono samples into fixed-size frames at a
/// target sample rate.
///
/// Device callbacks and file readers hand over buffers of whatever size they
/// like; the live adapter wants `frame_size` samples at the endpoint's rate.
pub struct FrameResampler {
    resampler: Option<FastFixedIn<f32>>,
    pending: VecDeque<f32>,
    output: VecDeque<f32>,
    frame_size: usize,
}

impl FrameResampler {
    pub fn new(in_rate: u32, out_rate: u32, frame_size: usize) -> Result<Self, ResampleError> {
        let resampler = if in_rate == out_rate {
            None
        } else {
            Some(create_resampler(in_rate, out_rate, frame_size)?)
        };
        Ok(Self {
            resampler,
            pending: VecDeque::new(),
            output: VecDeque::new(),
            frame_size,
        })
    }

    /// Feeds samples in and returns every frame that is now complete.
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<Vec<f32>>, ResampleError> {
        match self.resampler.as_mut() {
            None => self.output.extend(samples.iter().copied()),
            Some(resampler) => {
                self.pending.extend(samples.iter().copied());
                loop {
                    let needed = resampler.input_frames_next();
                    if self.pending.len() < needed {
                        break;
                    }
                    let chunk: Vec<f32> = self.pending.drain(..needed).collect();
                    let resampled = resampler.process(&[chunk.as_slice()], None)?;
                    if let Some(channel) = resampled.first() {
                        self.output.extend(channel.iter().copied());
                    }
                }
            }
        }

        let mut frames = Vec::new();
        while self.output.len() >= self.frame_size {
            frames.push(self.output.drain(..self.frame_size).collect());
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_only_reframes() {
        let mut framer = FrameResampler::new(16_000, 16_000, 4).unwrap();
        let frames = framer.push(&[0.1; 10]).unwrap();
        assert_eq!(frames.len(), 2);
        let frames = framer.push(&[0.1; 2]).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames.iter().all(|f| f.len() == 4));
    }

    #[test]
    fn whole_buffer_conversion_scales_length() {
        let out = convert(&[0.0; 2_400], 24_000, 48_000).unwrap();
        assert!(out.len() > 4_000 && out.len() < 4_900, "len {}", out.len());
        assert_eq!(convert(&[0.5; 10], 16_000, 16_000).unwrap(), vec![0.5; 10]);
    }

    #[test]
    fn downsampling_roughly_preserves_duration() {
        let mut framer = FrameResampler::new(48_000, 16_000, 256).unwrap();
        let mut produced = 0;
        for _ in 0..20 {
            for frame in framer.push(&[0.0; 4_800]).unwrap() {
                produced += frame.len();
            }
        }
        // 96 000 input samples at 48 kHz is two seconds, i.e. ~32 000 at 16 kHz.
        assert!(produced > 30_000 && produced < 33_000, "produced {produced}");
    }
}
