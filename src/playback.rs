// External music player boundary.
// The workout never depends on these calls succeeding: failures are logged and dropped.

use parking_lot::Mutex;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::PlaybackError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    pub paused: bool,
    pub track: Option<TrackInfo>,
}

pub trait PlaybackService {
    fn play(&self) -> Result<(), PlaybackError>;
    fn pause(&self) -> Result<(), PlaybackError>;
    fn resume(&self) -> Result<(), PlaybackError>;
    fn set_volume(&self, volume: f32) -> Result<(), PlaybackError>;
    /// `None` when nothing is loaded in the player.
    fn current_state(&self) -> Result<Option<PlaybackState>, PlaybackError>;
}

impl<T: PlaybackService + ?Sized> PlaybackService for Box<T> {
    fn play(&self) -> Result<(), PlaybackError> {
        (**self).play()
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        (**self).pause()
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        (**self).resume()
    }

    fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        (**self).set_volume(volume)
    }

    fn current_state(&self) -> Result<Option<PlaybackState>, PlaybackError> {
        (**self).current_state()
    }
}

/// No music at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlayback;

impl PlaybackService for NoPlayback {
    fn play(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn set_volume(&self, _volume: f32) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn current_state(&self) -> Result<Option<PlaybackState>, PlaybackError> {
        Ok(None)
    }
}

/// Upper bound for a single `playerctl` invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Drives whatever MPRIS player is active through the `playerctl` CLI.
///
/// Every call blocks until the child exits or [`COMMAND_TIMEOUT`] passes, so
/// the app wraps it in a [`BackgroundPlayback`].
#[derive(Debug, Clone)]
pub struct PlayerctlService {
    program: String,
    timeout: Duration,
}

impl PlayerctlService {
    pub fn new() -> Self {
        Self::with_program("playerctl")
    }

    pub fn with_program<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, args: &[&str]) -> Result<String, PlaybackError> {
        let command = || format!("{} {}", self.program, args.join(" "));
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PlaybackError::Unavailable,
                _ => PlaybackError::Io(e),
            })?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                // the child may have exited between the two checks
                let _ = child.kill();
                let _ = child.wait();
                return Err(PlaybackError::TimedOut {
                    command: command(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(PlaybackError::CommandFailed {
                command: command(),
                status: status.to_string(),
            });
        }
        let mut stdout = Vec::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_end(&mut stdout)?;
        }
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }
}

impl Default for PlayerctlService {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `playerctl status` output. `Stopped` counts as nothing loaded.
pub fn parse_status(status: &str) -> Option<bool> {
    match status.trim() {
        "Playing" => Some(false),
        "Paused" => Some(true),
        _ => None,
    }
}

/// Parse `playerctl metadata --format '{{artist}}\t{{title}}'`.
pub fn parse_track(line: &str) -> Option<TrackInfo> {
    let (artist, title) = line.split_once('\t')?;
    if title.trim().is_empty() {
        return None;
    }
    Some(TrackInfo {
        title: title.trim().to_string(),
        artist: artist.trim().to_string(),
    })
}

impl PlaybackService for PlayerctlService {
    fn play(&self) -> Result<(), PlaybackError> {
        self.run(&["play"]).map(|_| ())
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        self.run(&["pause"]).map(|_| ())
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        self.run(&["play"]).map(|_| ())
    }

    fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        let level = format!("{:.2}", volume.clamp(0.0, 1.0));
        self.run(&["volume", &level]).map(|_| ())
    }

    fn current_state(&self) -> Result<Option<PlaybackState>, PlaybackError> {
        // playerctl exits non-zero with "No players found" when nothing is running
        let status = match self.run(&["status"]) {
            Ok(status) => status,
            Err(PlaybackError::CommandFailed { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(paused) = parse_status(&status) else {
            return Ok(None);
        };
        let track = self
            .run(&["metadata", "--format", "{{artist}}\t{{title}}"])
            .ok()
            .and_then(|line| parse_track(&line));
        Ok(Some(PlaybackState { paused, track }))
    }
}

#[derive(Debug)]
enum PlayerCommand {
    Play,
    Pause,
    SetVolume(f32),
    Refresh,
}

/// Moves a blocking player onto its own thread.
///
/// Calls only queue a command and return at once. `current_state` answers
/// from a cache the worker refreshes after each batch of commands, updated
/// optimistically by `play`, `resume` and `pause` in the meantime.
#[derive(Debug)]
pub struct BackgroundPlayback {
    tx: Sender<PlayerCommand>,
    cached: Arc<Mutex<Option<PlaybackState>>>,
}

impl BackgroundPlayback {
    pub fn spawn<P: PlaybackService + Send + 'static>(service: P) -> Self {
        let (tx, rx) = mpsc::channel();
        let cached = Arc::new(Mutex::new(None));
        let shared = Arc::clone(&cached);

        thread::spawn(move || {
            let manager = PlaybackManager::new(service);
            *shared.lock() = manager.state();

            while let Ok(first) = rx.recv() {
                let mut volume = None;
                for command in std::iter::once(first).chain(rx.try_iter()) {
                    match command {
                        PlayerCommand::Play => manager.play(),
                        PlayerCommand::Pause => manager.pause(),
                        // a backlog of fade steps collapses to the newest level
                        PlayerCommand::SetVolume(level) => volume = Some(level),
                        PlayerCommand::Refresh => {}
                    }
                }
                if let Some(level) = volume {
                    manager.set_volume(level);
                }
                *shared.lock() = manager.state();
            }
            tracing::debug!("player worker stopped");
        });

        Self { tx, cached }
    }

    fn send(&self, command: PlayerCommand) -> Result<(), PlaybackError> {
        self.tx
            .send(command)
            .map_err(|_| PlaybackError::Unavailable)
    }

    fn mark_playing(&self) {
        let mut cached = self.cached.lock();
        let track = cached.take().and_then(|s| s.track);
        *cached = Some(PlaybackState {
            paused: false,
            track,
        });
    }
}

impl PlaybackService for BackgroundPlayback {
    fn play(&self) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Play)?;
        self.mark_playing();
        Ok(())
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Pause)?;
        if let Some(state) = self.cached.lock().as_mut() {
            state.paused = true;
        }
        Ok(())
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        self.play()
    }

    fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::SetVolume(volume))
    }

    fn current_state(&self) -> Result<Option<PlaybackState>, PlaybackError> {
        self.send(PlayerCommand::Refresh)?;
        Ok(self.cached.lock().clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCall {
    Play,
    Pause,
    Resume,
    SetVolume(f32),
}

#[derive(Debug, Default)]
struct RecordedPlayback {
    calls: Vec<PlaybackCall>,
    state: Option<PlaybackState>,
    failing: bool,
}

/// In-memory player used by headless runs. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingPlayback {
    inner: Arc<Mutex<RecordedPlayback>>,
}

impl RecordingPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlaybackCall> {
        self.inner.lock().calls.clone()
    }

    pub fn set_state(&self, state: Option<PlaybackState>) {
        self.inner.lock().state = state;
    }

    /// Make every call fail from now on.
    pub fn fail_all(&self) {
        self.inner.lock().failing = true;
    }

    fn record(&self, call: PlaybackCall) -> Result<(), PlaybackError> {
        let mut inner = self.inner.lock();
        if inner.failing {
            return Err(PlaybackError::Unavailable);
        }
        match &call {
            PlaybackCall::Play | PlaybackCall::Resume => {
                let track = inner.state.take().and_then(|s| s.track);
                inner.state = Some(PlaybackState {
                    paused: false,
                    track,
                });
            }
            PlaybackCall::Pause => {
                if let Some(state) = inner.state.as_mut() {
                    state.paused = true;
                }
            }
            PlaybackCall::SetVolume(_) => {}
        }
        inner.calls.push(call);
        Ok(())
    }
}

impl PlaybackService for RecordingPlayback {
    fn play(&self) -> Result<(), PlaybackError> {
        self.record(PlaybackCall::Play)
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        self.record(PlaybackCall::Pause)
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        self.record(PlaybackCall::Resume)
    }

    fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        self.record(PlaybackCall::SetVolume(volume))
    }

    fn current_state(&self) -> Result<Option<PlaybackState>, PlaybackError> {
        let inner = self.inner.lock();
        if inner.failing {
            return Err(PlaybackError::Unavailable);
        }
        Ok(inner.state.clone())
    }
}

/// Phase-aware wrapper around the player. Only issues a call when the player
/// state says it would change something, and never propagates errors.
#[derive(Debug)]
pub struct PlaybackManager<P: PlaybackService> {
    service: P,
}

impl<P: PlaybackService> PlaybackManager<P> {
    pub fn new(service: P) -> Self {
        Self { service }
    }

    fn state(&self) -> Option<PlaybackState> {
        match self.service.current_state() {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(%err, "could not query player state");
                None
            }
        }
    }

    /// Resume paused music, or start playback when nothing is loaded.
    pub fn play(&self) {
        let result = match self.state() {
            Some(state) if state.paused => self.service.resume(),
            Some(_) => return,
            None => {
                tracing::info!("starting playback");
                self.service.play()
            }
        };
        if let Err(err) = result {
            tracing::warn!(%err, "failed to start music");
        }
    }

    pub fn pause(&self) {
        match self.state() {
            Some(state) if !state.paused => {
                if let Err(err) = self.service.pause() {
                    tracing::warn!(%err, "failed to pause music");
                }
            }
            _ => {}
        }
    }

    pub fn set_volume(&self, volume: f32) {
        if let Err(err) = self.service.set_volume(volume.clamp(0.0, 1.0)) {
            tracing::debug!(%err, "failed to set music volume");
        }
    }

    pub fn now_playing(&self) -> Option<TrackInfo> {
        self.state().and_then(|s| s.track)
    }
}
