use std::time::Duration;

use crate::cue::{countdown_timeline, CueAction, CueScheduler};
use crate::error::AudioError;
use crate::phase::Phase;
use crate::tone::{AudioBackend, Tone};

/// Level of a beep at full cue bus volume.
pub const BEEP_LEVEL: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Bus {
    Music,
    Cue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasePreset {
    pub music: f32,
    pub cue: f32,
}

/// Bus volumes for each phase.
pub fn phase_preset(phase: Phase) -> PhasePreset {
    match phase {
        Phase::Preparing => PhasePreset {
            music: 0.70,
            cue: 1.00,
        },
        Phase::Exercising => PhasePreset {
            music: 0.85,
            cue: 1.00,
        },
        Phase::Resting => PhasePreset {
            music: 1.00,
            cue: 0.90,
        },
        Phase::Completed => PhasePreset {
            music: 1.00,
            cue: 1.00,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueOutcome {
    Scheduled,
    /// Another sequence was still in flight; this one was ignored.
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerEvent {
    SequenceFinished,
}

#[derive(Debug, Clone, Copy)]
struct Ramp {
    from: f32,
    to: f32,
    duration: Duration,
    elapsed: Duration,
}

impl Ramp {
    fn value(&self) -> f32 {
        if self.elapsed >= self.duration {
            return self.to;
        }
        let t = self.elapsed.as_secs_f32() / self.duration.as_secs_f32();
        self.from + (self.to - self.from) * t
    }
}

#[derive(Debug, Clone, Copy)]
struct BusState {
    volume: f32,
    ramp: Option<Ramp>,
}

impl BusState {
    fn new(volume: f32) -> Self {
        Self { volume, ramp: None }
    }

    fn advance(&mut self, dt: Duration) {
        if let Some(ramp) = self.ramp.as_mut() {
            ramp.elapsed += dt;
            self.volume = ramp.value();
            if ramp.elapsed >= ramp.duration {
                self.ramp = None;
            }
        }
    }
}

/// Two gain buses plus the countdown sequencer.
///
/// Without a backend every cue is still sequenced, so completion events keep
/// flowing, but nothing is heard.
pub struct AudioMixer {
    backend: Option<Box<dyn AudioBackend>>,
    music: BusState,
    cue: BusState,
    cues: CueScheduler,
    due: Vec<CueAction>,
}

impl AudioMixer {
    pub fn new(backend: Option<Box<dyn AudioBackend>>) -> Self {
        let preset = phase_preset(Phase::Preparing);
        Self {
            backend,
            music: BusState::new(preset.music),
            cue: BusState::new(preset.cue),
            cues: CueScheduler::new(),
            due: Vec::new(),
        }
    }

    /// Acquire the backend once. A failure is logged here and only here;
    /// the mixer then runs silent.
    pub fn initialize<F, B>(acquire: F) -> Self
    where
        F: FnOnce() -> Result<B, AudioError>,
        B: AudioBackend + 'static,
    {
        match acquire() {
            Ok(backend) => Self::new(Some(Box::new(backend))),
            Err(err) => {
                tracing::error!(%err, "cue audio disabled");
                Self::new(None)
            }
        }
    }

    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn volume(&self, bus: Bus) -> f32 {
        self.bus(bus).volume
    }

    pub fn is_fading(&self, bus: Bus) -> bool {
        self.bus(bus).ramp.is_some()
    }

    fn bus(&self, bus: Bus) -> &BusState {
        match bus {
            Bus::Music => &self.music,
            Bus::Cue => &self.cue,
        }
    }

    fn bus_mut(&mut self, bus: Bus) -> &mut BusState {
        match bus {
            Bus::Music => &mut self.music,
            Bus::Cue => &mut self.cue,
        }
    }

    /// Out of range values are clamped to [0, 1]. Cancels a ramp on the bus.
    pub fn set_bus_volume(&mut self, bus: Bus, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        tracing::trace!(%bus, volume, "bus volume set");
        let state = self.bus_mut(bus);
        state.ramp = None;
        state.volume = volume;
    }

    pub fn apply_phase_preset(&mut self, phase: Phase) {
        let preset = phase_preset(phase);
        self.set_bus_volume(Bus::Music, preset.music);
        self.set_bus_volume(Bus::Cue, preset.cue);
    }

    /// Linear ramp from the current volume. Replaces any ramp already
    /// running on the bus.
    pub fn fade(&mut self, bus: Bus, target: f32, duration: Duration) {
        let target = target.clamp(0.0, 1.0);
        if duration.is_zero() {
            self.set_bus_volume(bus, target);
            return;
        }
        tracing::debug!(%bus, target, ?duration, "bus fade");
        let state = self.bus_mut(bus);
        state.ramp = Some(Ramp {
            from: state.volume,
            to: target,
            duration,
            elapsed: Duration::ZERO,
        });
    }

    pub fn cue_in_flight(&self) -> bool {
        self.cues.is_in_flight()
    }

    /// Queue a countdown of `count` beeps followed by the start chime.
    /// Overlapping sequences are not allowed: while one is in flight, new
    /// requests are dropped.
    pub fn play_countdown_sequence(&mut self, count: u32) -> CueOutcome {
        if count == 0 {
            tracing::warn!("ignoring empty countdown");
            return CueOutcome::Dropped;
        }
        if self.cues.is_in_flight() {
            let remaining = self.cues.remaining().unwrap_or_default();
            tracing::debug!(count, ?remaining, "countdown dropped, sequence in flight");
            return CueOutcome::Dropped;
        }

        tracing::debug!(count, "countdown scheduled");
        self.cues.schedule(countdown_timeline(count));
        // the first beep is due immediately
        self.drain_cues(Duration::ZERO);
        CueOutcome::Scheduled
    }

    /// Cancel the in-flight sequence; no pending tone fires afterwards.
    pub fn cancel_cues(&mut self) {
        let cancelled = self.cues.clear();
        if cancelled > 0 {
            tracing::debug!(cancelled, "countdown cancelled");
        }
    }

    /// Stop every pending timer the mixer owns: cues and both ramps.
    pub fn cancel_all(&mut self) {
        self.cancel_cues();
        self.music.ramp = None;
        self.cue.ramp = None;
    }

    /// Advance ramps and the cue timeline by `dt`.
    pub fn advance(&mut self, dt: Duration) -> Option<MixerEvent> {
        self.music.advance(dt);
        self.cue.advance(dt);
        self.drain_cues(dt)
    }

    fn drain_cues(&mut self, dt: Duration) -> Option<MixerEvent> {
        self.due.clear();
        self.cues.advance(dt, &mut self.due);

        let mut event = None;
        for action in self.due.drain(..) {
            match action {
                CueAction::Beep {
                    frequency_hz,
                    duration,
                } => {
                    if let Some(backend) = self.backend.as_mut() {
                        backend.emit(Tone::new(
                            frequency_hz,
                            duration,
                            self.cue.volume * BEEP_LEVEL,
                        ));
                    }
                }
                CueAction::Finish => event = Some(MixerEvent::SequenceFinished),
            }
        }
        event
    }

    /// Wake the backend. Only acts when it is suspended.
    pub fn resume(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            if !backend.is_running() {
                if let Err(err) = backend.resume() {
                    tracing::warn!(%err, "failed to resume audio backend");
                }
            }
        }
    }

    /// Put the backend to sleep. Only acts when it is running.
    pub fn suspend(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            if backend.is_running() {
                if let Err(err) = backend.suspend() {
                    tracing::warn!(%err, "failed to suspend audio backend");
                }
            }
        }
    }

    /// Cancel everything and release the backend.
    pub fn teardown(&mut self) {
        self.cancel_all();
        self.backend = None;
    }
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self::silent()
    }
}
