pub mod pcm;
pub mod resample;
pub mod wav;

#[cfg(feature = "native")]
pub mod device;

/// Sample rate the live voice endpoint expects for microphone audio.
pub const LIVE_INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of the audio the live voice endpoint streams back.
pub const LIVE_OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Number of mono samples in one captured frame.
pub const CAPTURE_FRAME_SIZE: usize = 256;
