use serde::{Deserialize, Serialize};

use crate::config::WorkoutConfig;

/// Fixed length of the preparation countdown.
pub const PREPARATION_SECONDS: u32 = 10;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
pub enum Phase {
    Preparing,
    Exercising,
    Resting,
    Completed,
}

/// Mutable state of the single running workout.
///
/// `is_paused` only means something while `is_running`; both false is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: Phase,
    pub remaining_seconds: u32,
    pub current_set: u32,
    pub is_running: bool,
    pub is_paused: bool,
}

impl SessionState {
    pub fn initial() -> Self {
        Self {
            phase: Phase::Preparing,
            remaining_seconds: PREPARATION_SECONDS,
            current_set: 1,
            is_running: false,
            is_paused: false,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    /// Set number after the transition was applied.
    pub set: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Running and not paused already; nothing changed.
    AlreadyRunning,
    /// The workout is over; only a reset leaves `Completed`.
    Finished,
    Started,
    Resumed,
}

/// Tick driven lifecycle: Preparing -> (Exercising -> Resting)* -> Exercising -> Completed.
///
/// The machine is pure. It reports transitions and leaves the audio and
/// playback side effects to the caller.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    config: WorkoutConfig,
    state: SessionState,
}

impl PhaseMachine {
    pub fn new(config: WorkoutConfig) -> Self {
        Self {
            config,
            state: SessionState::initial(),
        }
    }

    pub fn config(&self) -> &WorkoutConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase_duration(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Preparing => PREPARATION_SECONDS,
            Phase::Exercising => self.config.exercise_seconds,
            Phase::Resting => self.config.rest_seconds,
            Phase::Completed => 0,
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.state.is_running && !self.state.is_paused
    }

    /// Advance one second. The tick that would reach zero applies the
    /// transition instead, so the new phase starts at its full duration.
    pub fn tick(&mut self) -> Option<Transition> {
        if !self.is_ticking() {
            return None;
        }

        if self.state.remaining_seconds > 1 {
            self.state.remaining_seconds -= 1;
            return None;
        }

        let from = self.state.phase;
        match from {
            Phase::Preparing => self.enter(Phase::Exercising),
            Phase::Exercising if self.state.current_set < self.config.total_sets => {
                self.enter(Phase::Resting)
            }
            Phase::Exercising => {
                self.enter(Phase::Completed);
                self.state.is_running = false;
                self.state.is_paused = false;
            }
            Phase::Resting => {
                self.state.current_set += 1;
                self.enter(Phase::Exercising);
            }
            Phase::Completed => return None,
        }

        Some(Transition {
            from,
            to: self.state.phase,
            set: self.state.current_set,
        })
    }

    fn enter(&mut self, phase: Phase) {
        self.state.phase = phase;
        self.state.remaining_seconds = self.phase_duration(phase);
    }

    pub fn start(&mut self) -> StartOutcome {
        if self.state.phase == Phase::Completed {
            return StartOutcome::Finished;
        }
        if self.is_ticking() {
            return StartOutcome::AlreadyRunning;
        }

        let resumed = self.state.is_running && self.state.is_paused;
        self.state.is_running = true;
        self.state.is_paused = false;
        if self.state.phase == Phase::Preparing {
            self.state.remaining_seconds = PREPARATION_SECONDS;
        }

        if resumed {
            StartOutcome::Resumed
        } else {
            StartOutcome::Started
        }
    }

    /// Returns false when there was nothing running to pause.
    pub fn pause(&mut self) -> bool {
        if !self.is_ticking() {
            return false;
        }
        self.state.is_paused = true;
        true
    }

    pub fn reset(&mut self) {
        self.state = SessionState::initial();
    }

    /// Caller is responsible for validating `config`.
    pub fn reconfigure(&mut self, config: WorkoutConfig) {
        self.config = config;
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn machine(exercise: u32, rest: u32, sets: u32) -> PhaseMachine {
        PhaseMachine::new(WorkoutConfig::new(exercise, rest, sets).unwrap())
    }

    fn tick_n(m: &mut PhaseMachine, n: u32) -> Vec<Transition> {
        (0..n).filter_map(|_| m.tick()).collect()
    }

    #[test]
    fn starts_in_preparing_idle() {
        let m = machine(30, 10, 3);
        assert_eq!(*m.state(), SessionState::initial());
        assert_eq!(m.state().remaining_seconds, 10);
        assert!(!m.is_ticking());
    }

    #[test]
    fn idle_machine_does_not_tick() {
        let mut m = machine(30, 10, 3);
        assert_eq!(m.tick(), None);
        assert_eq!(m.state().remaining_seconds, 10);
    }

    #[test]
    fn preparation_hands_over_to_exercise_at_full_duration() {
        let mut m = machine(30, 10, 3);
        m.start();
        assert!(tick_n(&mut m, 9).is_empty());
        assert_eq!(m.state().remaining_seconds, 1);

        let t = m.tick().unwrap();
        assert_eq!(t.from, Phase::Preparing);
        assert_eq!(t.to, Phase::Exercising);
        assert_eq!(m.state().remaining_seconds, 30);
        assert_eq!(m.state().current_set, 1);
    }

    #[test]
    fn rest_increments_set() {
        let mut m = machine(2, 3, 2);
        m.start();
        let transitions = tick_n(&mut m, 10 + 2 + 3);
        let phases: Vec<_> = transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            phases,
            vec![Phase::Exercising, Phase::Resting, Phase::Exercising]
        );
        assert_eq!(m.state().current_set, 2);
        assert_eq!(m.state().remaining_seconds, 2);
    }

    #[test]
    fn last_exercise_completes_and_stops() {
        let mut m = machine(2, 1, 1);
        m.start();
        let transitions = tick_n(&mut m, 12);
        assert_eq!(transitions.last().unwrap().to, Phase::Completed);
        let s = m.state();
        assert_eq!(s.phase, Phase::Completed);
        assert_eq!(s.remaining_seconds, 0);
        assert!(!s.is_running);
        assert_eq!(s.current_set, 1);

        // terminal
        assert_eq!(m.tick(), None);
        assert_matches!(m.start(), StartOutcome::Finished);
        assert_eq!(m.state().phase, Phase::Completed);
    }

    #[test]
    fn completes_after_exact_tick_count() {
        for (exercise, rest, sets) in [(1, 1, 1), (3, 2, 4), (30, 10, 3), (7, 300, 2)] {
            let cfg = WorkoutConfig::new(exercise, rest, sets).unwrap();
            let mut m = PhaseMachine::new(cfg);
            m.start();
            let total = cfg.total_ticks(PREPARATION_SECONDS);
            for _ in 0..total - 1 {
                m.tick();
                assert_ne!(m.state().phase, Phase::Completed);
            }
            m.tick();
            assert_eq!(m.state().phase, Phase::Completed);
            assert_eq!(m.state().current_set, sets);
        }
    }

    #[test]
    fn remaining_stays_within_phase_duration() {
        let mut m = machine(4, 2, 3);
        m.start();
        for _ in 0..200 {
            m.tick();
            let s = *m.state();
            assert!(s.remaining_seconds <= m.phase_duration(s.phase));
            assert!(s.current_set >= 1 && s.current_set <= 3);
            if s.phase != Phase::Completed {
                assert!(s.remaining_seconds >= 1);
            }
        }
        assert_eq!(m.state().phase, Phase::Completed);
    }

    #[test]
    fn start_is_noop_while_running() {
        let mut m = machine(30, 10, 3);
        assert_matches!(m.start(), StartOutcome::Started);
        m.tick();
        assert_matches!(m.start(), StartOutcome::AlreadyRunning);
        assert_eq!(m.state().remaining_seconds, 9);
    }

    #[test]
    fn pause_then_start_resumes_from_same_second() {
        let mut m = machine(30, 10, 3);
        m.start();
        tick_n(&mut m, 15);
        assert_eq!(m.state().phase, Phase::Exercising);
        let before = m.state().remaining_seconds;

        assert!(m.pause());
        assert_eq!(m.tick(), None);
        assert_eq!(m.state().remaining_seconds, before);

        assert_matches!(m.start(), StartOutcome::Resumed);
        assert_eq!(m.state().remaining_seconds, before);
        assert_eq!(m.state().phase, Phase::Exercising);
    }

    #[test]
    fn start_in_preparing_restarts_preparation() {
        let mut m = machine(30, 10, 3);
        m.start();
        tick_n(&mut m, 4);
        m.pause();
        m.start();
        assert_eq!(m.state().remaining_seconds, PREPARATION_SECONDS);
    }

    #[test]
    fn pause_without_running_is_ignored() {
        let mut m = machine(30, 10, 3);
        assert!(!m.pause());
        assert!(!m.state().is_paused);
    }

    #[test]
    fn reset_from_rest_returns_to_initial() {
        let mut m = machine(2, 5, 3);
        m.start();
        tick_n(&mut m, 10 + 2 + 2 + 5 + 2 + 1);
        assert_eq!(m.state().phase, Phase::Resting);
        assert_eq!(m.state().current_set, 2);

        m.reset();
        assert_eq!(*m.state(), SessionState::initial());
    }

    #[test]
    fn reconfigure_applies_to_following_phases() {
        let mut m = machine(30, 10, 3);
        m.start();
        tick_n(&mut m, 20);

        m.reconfigure(WorkoutConfig::new(45, 15, 5).unwrap());
        assert_eq!(*m.state(), SessionState::initial());

        m.start();
        tick_n(&mut m, 10);
        assert_eq!(m.state().phase, Phase::Exercising);
        assert_eq!(m.state().remaining_seconds, 45);
        tick_n(&mut m, 45);
        assert_eq!(m.state().phase, Phase::Resting);
        assert_eq!(m.state().remaining_seconds, 15);
    }

    #[test]
    fn phase_display_names() {
        assert_eq!(Phase::Preparing.to_string(), "Preparing");
        assert_eq!(Phase::Completed.to_string(), "Completed");
    }
}
