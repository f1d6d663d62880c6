use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::WorkoutConfig;
use crate::error::ConfigError;
use crate::mixer::{phase_preset, AudioMixer, Bus, MixerEvent};
use crate::phase::{Phase, PhaseMachine, SessionState, StartOutcome, Transition};
use crate::playback::{PlaybackManager, PlaybackService};
use crate::store::StateStore;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Beeps in every cue sequence, on start and on each transition.
pub const CUE_COUNT: u32 = 3;

/// Music fade-in when resuming from pause.
pub const RESUME_FADE: Duration = Duration::from_millis(500);

/// Smallest music volume change worth forwarding to the player mid-fade.
const VOLUME_STEP: f32 = 0.01;

/// Read-only view of the session handed to the UI and to persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub remaining_seconds: u32,
    pub current_set: u32,
    pub total_sets: u32,
    pub is_running: bool,
    pub is_paused: bool,
    pub config: WorkoutConfig,
}

impl SessionSnapshot {
    pub fn new(state: &SessionState, config: &WorkoutConfig) -> Self {
        Self {
            phase: state.phase,
            remaining_seconds: state.remaining_seconds,
            current_set: state.current_set,
            total_sets: config.total_sets,
            is_running: state.is_running,
            is_paused: state.is_paused,
            config: *config,
        }
    }

    pub fn phase_duration(&self) -> u32 {
        PhaseMachine::new(self.config).phase_duration(self.phase)
    }
}

/// 1 Hz tick source. Armed while the workout runs; cancelling also drops the
/// partial second accumulated so far.
#[derive(Debug, Default)]
struct TickSource {
    armed: bool,
    carry: Duration,
}

impl TickSource {
    fn arm(&mut self) {
        if !self.armed {
            self.armed = true;
            self.carry = Duration::ZERO;
        }
    }

    fn cancel(&mut self) {
        self.armed = false;
        self.carry = Duration::ZERO;
    }

    /// Time until the next tick, if armed.
    fn until_due(&self) -> Option<Duration> {
        self.armed.then(|| TICK_INTERVAL - self.carry)
    }

    /// Returns true when `dt` completed a tick.
    fn elapse(&mut self, dt: Duration) -> bool {
        if !self.armed {
            return false;
        }
        self.carry += dt;
        if self.carry >= TICK_INTERVAL {
            self.carry -= TICK_INTERVAL;
            return true;
        }
        false
    }
}

/// Owns the workout: phase machine, mixer, music player, persistence and the
/// tick source. All mutation goes through `&mut self`, so a tick always runs
/// to completion before the next command or tick.
pub struct WorkoutSession<P: PlaybackService, S: StateStore> {
    machine: PhaseMachine,
    mixer: AudioMixer,
    playback: PlaybackManager<P>,
    store: S,
    ticks: TickSource,
    music_on_cue_end: bool,
    sent_music_volume: Option<f32>,
    persist_failed: bool,
}

impl<P: PlaybackService, S: StateStore> WorkoutSession<P, S> {
    pub fn new(config: WorkoutConfig, mixer: AudioMixer, playback: P, store: S) -> Self {
        Self {
            machine: PhaseMachine::new(config),
            mixer,
            playback: PlaybackManager::new(playback),
            store,
            ticks: TickSource::default(),
            music_on_cue_end: false,
            sent_music_volume: None,
            persist_failed: false,
        }
    }

    /// Build a session from the stored config, falling back to the default.
    pub fn restore(mixer: AudioMixer, playback: P, store: S) -> Self {
        let config = store.load_config().unwrap_or_default();
        tracing::info!(?config, "session restored");
        Self::new(config, mixer, playback, store)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::new(self.machine.state(), self.machine.config())
    }

    pub fn state(&self) -> &SessionState {
        self.machine.state()
    }

    pub fn config(&self) -> &WorkoutConfig {
        self.machine.config()
    }

    pub fn mixer(&self) -> &AudioMixer {
        &self.mixer
    }

    pub fn playback(&self) -> &PlaybackManager<P> {
        &self.playback
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_ticking(&self) -> bool {
        self.ticks.armed && self.machine.is_ticking()
    }

    pub fn start(&mut self) {
        let outcome = self.machine.start();
        let phase = self.machine.state().phase;
        match outcome {
            StartOutcome::AlreadyRunning | StartOutcome::Finished => {
                tracing::debug!(?outcome, "start ignored");
                return;
            }
            StartOutcome::Started => self.mixer.apply_phase_preset(phase),
            StartOutcome::Resumed => {
                let preset = phase_preset(phase);
                self.mixer.set_bus_volume(Bus::Cue, preset.cue);
                self.mixer.fade(Bus::Music, preset.music, RESUME_FADE);
                // a pending first-exercise start waits for the new start cue
                if phase != Phase::Preparing && !self.music_on_cue_end {
                    self.playback.play();
                }
            }
        }
        tracing::info!(?outcome, %phase, "workout started");

        self.ticks.arm();
        self.mixer.resume();
        self.mixer.play_countdown_sequence(CUE_COUNT);
        self.sync_music_volume();
        self.persist();
    }

    /// Freeze the countdown. Pending cue tones are abandoned; the start cue is
    /// played again on resume.
    pub fn pause(&mut self) {
        if !self.machine.pause() {
            return;
        }
        tracing::info!(remaining = self.state().remaining_seconds, "workout paused");

        self.ticks.cancel();
        self.mixer.cancel_cues();
        self.mixer.suspend();
        self.mixer.set_bus_volume(Bus::Music, 0.0);
        self.playback.pause();
        self.sync_music_volume();
        self.persist();
    }

    /// Back to the initial lifecycle state. Every pending timer (tick, fades,
    /// cue sequence) is stopped before this returns and no cue is played.
    pub fn reset(&mut self) {
        self.halt();
        self.machine.reset();
        tracing::info!("workout reset");
        self.settle();
    }

    /// Replace the configuration. Invalid configs are rejected with the state
    /// untouched; otherwise the tick source is stopped first and the run resets.
    pub fn reconfigure(&mut self, config: WorkoutConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.halt();
        self.machine.reconfigure(config);
        tracing::info!(?config, "workout reconfigured");
        self.settle();
        Ok(())
    }

    fn halt(&mut self) {
        self.ticks.cancel();
        self.mixer.cancel_all();
        self.music_on_cue_end = false;
    }

    fn settle(&mut self) {
        self.mixer.apply_phase_preset(Phase::Preparing);
        self.sync_music_volume();
        self.persist();
    }

    /// One elapsed second. Applies at most one transition along with its cue
    /// and volume preset.
    pub fn tick(&mut self) -> Option<Transition> {
        if !self.machine.is_ticking() {
            return None;
        }
        let transition = self.machine.tick();
        if let Some(t) = transition {
            self.on_transition(t);
        }
        self.persist();
        transition
    }

    fn on_transition(&mut self, t: Transition) {
        tracing::debug!(from = %t.from, to = %t.to, set = t.set, "phase transition");

        self.mixer.apply_phase_preset(t.to);
        self.mixer.play_countdown_sequence(CUE_COUNT);

        match (t.from, t.to) {
            (Phase::Preparing, Phase::Exercising) => self.music_on_cue_end = true,
            (_, Phase::Completed) => {
                self.ticks.cancel();
                tracing::info!(sets = t.set, "workout completed");
            }
            _ => {}
        }
        self.sync_music_volume();
    }

    /// Feed elapsed wall time. Audio is stepped up to each tick boundary
    /// before the tick runs, so one large step behaves like many small ones.
    pub fn advance(&mut self, elapsed: Duration) {
        let mut left = elapsed;
        loop {
            let step = match self.ticks.until_due() {
                Some(wait) if wait <= left => wait,
                _ => left,
            };
            self.step_audio(step);
            left -= step;
            if !self.ticks.elapse(step) {
                break;
            }
            self.tick();
        }
        self.sync_music_volume();
    }

    fn step_audio(&mut self, dt: Duration) {
        if let Some(MixerEvent::SequenceFinished) = self.mixer.advance(dt) {
            if std::mem::take(&mut self.music_on_cue_end) {
                self.playback.play();
            }
        }
    }

    /// Release the audio backend and stop all timers.
    pub fn teardown(&mut self) {
        self.halt();
        self.mixer.teardown();
    }

    fn sync_music_volume(&mut self) {
        let volume = self.mixer.volume(Bus::Music);
        let changed = match self.sent_music_volume {
            None => true,
            Some(sent) => {
                let diff = (sent - volume).abs();
                diff >= VOLUME_STEP || (diff > 0.0 && !self.mixer.is_fading(Bus::Music))
            }
        };
        if changed {
            self.playback.set_volume(volume);
            self.sent_music_volume = Some(volume);
        }
    }

    fn persist(&mut self) {
        match self.store.save(&self.snapshot()) {
            Ok(()) => self.persist_failed = false,
            Err(err) if !self.persist_failed => {
                tracing::warn!(%err, "failed to persist session");
                self.persist_failed = true;
            }
            Err(_) => {}
        }
    }
}
