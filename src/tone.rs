// Tone output for countdown cues.
// The cpal backend renders a small bank of sine voices from the output callback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AudioError;

/// Fade applied at both ends of every tone so a beep never clicks.
const EDGE_RAMP_SECS: f32 = 0.005;

/// Upper bound on simultaneously sounding tones; the oldest is dropped beyond it.
const MAX_VOICES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration: Duration,
    /// Final linear gain, already scaled by the cue bus.
    pub volume: f32,
}

impl Tone {
    pub fn new(frequency_hz: f32, duration: Duration, volume: f32) -> Self {
        Self {
            frequency_hz,
            duration,
            volume: volume.clamp(0.0, 1.0),
        }
    }
}

/// Capability to make sound. Must be acquired before any tone is emitted.
pub trait AudioBackend {
    /// Start a monaural tone. Never blocks; the tone silences itself.
    fn emit(&mut self, tone: Tone);
    fn resume(&mut self) -> Result<(), AudioError>;
    fn suspend(&mut self) -> Result<(), AudioError>;
    fn is_running(&self) -> bool;
}

#[derive(Debug, Clone)]
struct Voice {
    step: f32,
    phase: f32,
    volume: f32,
    position: usize,
    length: usize,
    edge: usize,
}

impl Voice {
    fn new(tone: Tone, sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        let length = (tone.duration.as_secs_f32() * sr).round().max(1.0) as usize;
        let edge = ((EDGE_RAMP_SECS * sr) as usize).clamp(1, length / 2 + 1);
        Self {
            step: tone.frequency_hz / sr,
            phase: 0.0,
            volume: tone.volume,
            position: 0,
            length,
            edge,
        }
    }

    fn is_done(&self) -> bool {
        self.position >= self.length
    }

    fn next_sample(&mut self) -> f32 {
        let from_start = self.position;
        let to_end = self.length - self.position;
        let envelope = (from_start.min(to_end) as f32 / self.edge as f32).min(1.0);
        let value = (self.phase * std::f32::consts::TAU).sin() * self.volume * envelope;
        self.phase = (self.phase + self.step) % 1.0;
        self.position += 1;
        value
    }
}

/// Default output device through cpal.
pub struct CpalBackend {
    stream: Stream,
    voices: Arc<Mutex<Vec<Voice>>>,
    sample_rate: u32,
    running: bool,
}

impl CpalBackend {
    pub fn acquire() -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::BackendUnavailable("no output device".into()))?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::BackendUnavailable(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let voices = Arc::new(Mutex::new(Vec::with_capacity(MAX_VOICES)));

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), voices.clone())?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), voices.clone())?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), voices.clone())?
            }
            format => {
                return Err(AudioError::BackendUnavailable(format!(
                    "unsupported sample format {:?}",
                    format
                )))
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::BackendUnavailable(e.to_string()))?;

        tracing::info!(sample_rate, "audio backend acquired");

        Ok(Self {
            stream,
            voices,
            sample_rate,
            running: true,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        voices: Arc<Mutex<Vec<Voice>>>,
    ) -> Result<Stream, AudioError> {
        let channels = config.channels as usize;
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut voices = voices.lock();
                    for frame in data.chunks_mut(channels) {
                        let mut mixed = 0.0f32;
                        for voice in voices.iter_mut() {
                            if !voice.is_done() {
                                mixed += voice.next_sample();
                            }
                        }
                        let value = T::from_sample(mixed.clamp(-1.0, 1.0));
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                    voices.retain(|v| !v.is_done());
                },
                move |err| {
                    tracing::warn!(%err, "audio output error");
                },
                None,
            )
            .map_err(|e| AudioError::BackendUnavailable(e.to_string()))
    }
}

impl AudioBackend for CpalBackend {
    fn emit(&mut self, tone: Tone) {
        let mut voices = self.voices.lock();
        if voices.len() >= MAX_VOICES {
            voices.remove(0);
        }
        voices.push(Voice::new(tone, self.sample_rate));
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        self.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        self.voices.lock().clear();
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[derive(Debug, Default)]
struct Recorded {
    tones: Vec<Tone>,
    suspended: bool,
    resumes: usize,
    suspends: usize,
}

/// Backend that records what it was asked to play. Clones share one log, so a
/// test can keep a handle while the mixer owns the boxed backend.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tones(&self) -> Vec<Tone> {
        self.inner.lock().tones.clone()
    }

    pub fn frequencies(&self) -> Vec<f32> {
        self.inner.lock().tones.iter().map(|t| t.frequency_hz).collect()
    }

    /// (resume calls, suspend calls) that actually changed state
    pub fn transitions(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.resumes, inner.suspends)
    }
}

impl AudioBackend for RecordingBackend {
    fn emit(&mut self, tone: Tone) {
        self.inner.lock().tones.push(tone);
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let mut inner = self.inner.lock();
        inner.suspended = false;
        inner.resumes += 1;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        let mut inner = self.inner.lock();
        inner.suspended = true;
        inner.suspends += 1;
        Ok(())
    }

    fn is_running(&self) -> bool {
        !self.inner.lock().suspended
    }
}
