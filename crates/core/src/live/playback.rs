//! Gapless scheduling of model audio onto an output clock.
//!
//! Chunks are queued back to back: each one starts at `max(cursor, now)` and
//! pushes the cursor forward by its own duration. An interruption stops every
//! chunk still tracked and rewinds the cursor to zero, so the next chunk lands
//! at the output's current time.

use interview_audio::pcm::duration_secs;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

pub type PlaybackId = u64;

/// A sink that can play sample buffers at absolute times on its own clock.
///
/// Each live session owns its output; nothing here is process-global.
pub trait AudioOutput: Send {
    /// Seconds on the output clock.
    fn current_time(&self) -> f64;
    fn start(&mut self, id: PlaybackId, at: f64, samples: Vec<f32>, sample_rate: u32);
    fn stop(&mut self, id: PlaybackId);
    /// Ids of chunks that have played out since the last call.
    fn drain_finished(&mut self) -> Vec<PlaybackId>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChunk {
    pub id: PlaybackId,
    pub start: f64,
    pub duration: f64,
}

pub struct PlaybackScheduler {
    output: Box<dyn AudioOutput>,
    cursor: f64,
    active: HashSet<PlaybackId>,
    next_id: PlaybackId,
}

impl PlaybackScheduler {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            cursor: 0.0,
            active: HashSet::new(),
            next_id: 0,
        }
    }

    pub fn enqueue(&mut self, samples: Vec<f32>, sample_rate: u32) -> ScheduledChunk {
        self.reap();
        let now = self.output.current_time();
        let start = self.cursor.max(now);
        let duration = duration_secs(samples.len(), sample_rate);

        self.next_id += 1;
        let id = self.next_id;
        self.output.start(id, start, samples, sample_rate);
        self.active.insert(id);
        self.cursor = start + duration;

        tracing::trace!(id, start, duration, "Scheduled audio chunk");
        ScheduledChunk {
            id,
            start,
            duration,
        }
    }

    /// Stops everything still playing. Returns how many chunks were cut.
    pub fn interrupt(&mut self) -> usize {
        let stopped = self.active.len();
        for id in self.active.drain() {
            self.output.stop(id);
        }
        self.cursor = 0.0;
        if stopped > 0 {
            tracing::debug!("Interrupted playback, stopped {} chunk(s)", stopped);
        }
        stopped
    }

    /// Forgets chunks the output reports as finished.
    pub fn reap(&mut self) {
        for id in self.output.drain_finished() {
            self.active.remove(&id);
        }
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

/// Time source for [`TimelineOutput`].
pub trait Clock: Send {
    fn now(&self) -> f64;
}

/// Wall-clock seconds since construction.
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn set(&self, secs: f64) {
        self.bits.store(secs.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

struct Voice {
    offset: usize,
    samples: Vec<f32>,
    end: f64,
}

/// Renders scheduled chunks into one mono buffer instead of a device.
///
/// Stopping a chunk removes whatever part of it lies after the current
/// time, the same as cutting a playing source.
pub struct TimelineOutput<C: Clock> {
    clock: C,
    sample_rate: u32,
    mix: Arc<Mutex<Vec<f32>>>,
    voices: HashMap<PlaybackId, Voice>,
}

/// Read access to a [`TimelineOutput`]'s buffer after it has been handed
/// to a scheduler.
#[derive(Clone)]
pub struct Recording {
    mix: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
}

impl Recording {
    pub fn samples(&self) -> Vec<f32> {
        lock(&self.mix).clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn lock(mix: &Mutex<Vec<f32>>) -> MutexGuard<'_, Vec<f32>> {
    mix.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<C: Clock> TimelineOutput<C> {
    pub fn new(clock: C, sample_rate: u32) -> Self {
        Self {
            clock,
            sample_rate,
            mix: Arc::new(Mutex::new(Vec::new())),
            voices: HashMap::new(),
        }
    }

    pub fn recording(&self) -> Recording {
        Recording {
            mix: self.mix.clone(),
            sample_rate: self.sample_rate,
        }
    }

    fn index_at(&self, secs: f64) -> usize {
        (secs.max(0.0) * self.sample_rate as f64).round() as usize
    }
}

/// Nearest-sample rate conversion; chunks normally already match.
fn stretch(samples: Vec<f32>, from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || samples.is_empty() {
        return samples;
    }
    let out_len = (samples.len() as u64 * to as u64 / from as u64) as usize;
    (0..out_len)
        .map(|i| {
            let src = (i as u64 * from as u64 / to as u64) as usize;
            samples[src.min(samples.len() - 1)]
        })
        .collect()
}

impl<C: Clock> AudioOutput for TimelineOutput<C> {
    fn current_time(&self) -> f64 {
        self.clock.now()
    }

    fn start(&mut self, id: PlaybackId, at: f64, samples: Vec<f32>, sample_rate: u32) {
        let samples = stretch(samples, sample_rate, self.sample_rate);
        let offset = self.index_at(at);
        {
            let mut mix = lock(&self.mix);
            if mix.len() < offset + samples.len() {
                mix.resize(offset + samples.len(), 0.0);
            }
            for (slot, s) in mix[offset..].iter_mut().zip(&samples) {
                *slot += *s;
            }
        }
        let end = at + duration_secs(samples.len(), self.sample_rate);
        self.voices.insert(
            id,
            Voice {
                offset,
                samples,
                end,
            },
        );
    }

    fn stop(&mut self, id: PlaybackId) {
        let Some(voice) = self.voices.remove(&id) else {
            return;
        };
        let cut = self.index_at(self.clock.now()).max(voice.offset);
        let mut mix = lock(&self.mix);
        for i in cut..voice.offset + voice.samples.len() {
            if let Some(slot) = mix.get_mut(i) {
                *slot -= voice.samples[i - voice.offset];
            }
        }
    }

    fn drain_finished(&mut self) -> Vec<PlaybackId> {
        let now = self.clock.now();
        let done: Vec<PlaybackId> = self
            .voices
            .iter()
            .filter(|(_, v)| v.end <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &done {
            self.voices.remove(id);
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 24_000;

    fn scheduler() -> (PlaybackScheduler, ManualClock, Recording) {
        let clock = ManualClock::default();
        let output = TimelineOutput::new(clock.clone(), RATE);
        let recording = output.recording();
        (PlaybackScheduler::new(Box::new(output)), clock, recording)
    }

    fn chunk(secs: f64) -> Vec<f32> {
        vec![0.5; (secs * RATE as f64) as usize]
    }

    #[test]
    fn back_to_back_chunks_queue_without_gaps() {
        let (mut playback, clock, _) = scheduler();
        clock.set(2.0);

        let first = playback.enqueue(chunk(0.5), RATE);
        clock.advance(0.1);
        let second = playback.enqueue(chunk(0.25), RATE);
        let third = playback.enqueue(chunk(1.0), RATE);

        assert_eq!(first.start, 2.0);
        assert!((second.start - 2.5).abs() < 1e-9);
        assert!((third.start - 2.75).abs() < 1e-9);
        assert!((playback.cursor() - 3.75).abs() < 1e-9);
        assert_eq!(playback.active_count(), 3);
    }

    #[test]
    fn late_chunk_starts_at_now() {
        let (mut playback, clock, _) = scheduler();
        playback.enqueue(chunk(0.5), RATE);
        clock.set(4.0);
        let next = playback.enqueue(chunk(0.5), RATE);
        assert_eq!(next.start, 4.0);
        // the first chunk ended long ago
        assert_eq!(playback.active_count(), 1);
    }

    #[test]
    fn interrupt_stops_tracked_chunks_and_rewinds() {
        let (mut playback, clock, recording) = scheduler();
        clock.set(1.0);
        playback.enqueue(chunk(1.0), RATE);
        playback.enqueue(chunk(1.0), RATE);
        clock.advance(0.5);

        assert_eq!(playback.interrupt(), 2);
        assert_eq!(playback.cursor(), 0.0);
        assert_eq!(playback.active_count(), 0);

        let samples = recording.samples();
        let at = |secs: f64| samples[(secs * RATE as f64) as usize];
        assert_eq!(at(1.25), 0.5);
        assert_eq!(at(1.75), 0.0);
        assert_eq!(at(2.5), 0.0);

        let next = playback.enqueue(chunk(0.1), RATE);
        assert_eq!(next.start, 1.5);
    }

    #[test]
    fn mismatched_rates_are_stretched() {
        assert_eq!(stretch(vec![1.0, 2.0], 12_000, 24_000), vec![1.0, 1.0, 2.0, 2.0]);
    }
}
