use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::error::ConfigError;

pub const EXERCISE_SECONDS_RANGE: RangeInclusive<u32> = 1..=300;
pub const REST_SECONDS_RANGE: RangeInclusive<u32> = 1..=300;
pub const TOTAL_SETS_RANGE: RangeInclusive<u32> = 1..=20;

/// User supplied workout shape. Immutable while a run is in progress;
/// changing it goes through `WorkoutSession::reconfigure`, which resets the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutConfig {
    pub exercise_seconds: u32,
    pub rest_seconds: u32,
    pub total_sets: u32,
}

impl Default for WorkoutConfig {
    fn default() -> Self {
        Self {
            exercise_seconds: 30,
            rest_seconds: 10,
            total_sets: 3,
        }
    }
}

impl WorkoutConfig {
    pub fn new(
        exercise_seconds: u32,
        rest_seconds: u32,
        total_sets: u32,
    ) -> Result<Self, ConfigError> {
        let cfg = Self {
            exercise_seconds,
            rest_seconds,
            total_sets,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !EXERCISE_SECONDS_RANGE.contains(&self.exercise_seconds) {
            return Err(ConfigError::ExerciseOutOfRange(self.exercise_seconds));
        }
        if !REST_SECONDS_RANGE.contains(&self.rest_seconds) {
            return Err(ConfigError::RestOutOfRange(self.rest_seconds));
        }
        if !TOTAL_SETS_RANGE.contains(&self.total_sets) {
            return Err(ConfigError::SetsOutOfRange(self.total_sets));
        }
        Ok(())
    }

    /// Copy with the exercise time shifted by `delta` seconds.
    /// The result is not validated.
    pub fn with_exercise_delta(&self, delta: i32) -> Self {
        Self {
            exercise_seconds: self.exercise_seconds.saturating_add_signed(delta),
            ..*self
        }
    }

    pub fn with_rest_delta(&self, delta: i32) -> Self {
        Self {
            rest_seconds: self.rest_seconds.saturating_add_signed(delta),
            ..*self
        }
    }

    pub fn with_sets_delta(&self, delta: i32) -> Self {
        Self {
            total_sets: self.total_sets.saturating_add_signed(delta),
            ..*self
        }
    }

    /// Number of one-second ticks from a fresh start until the workout completes.
    pub fn total_ticks(&self, preparation_seconds: u32) -> u32 {
        preparation_seconds + self.total_sets * (self.exercise_seconds + self.rest_seconds)
            - self.rest_seconds
    }
}
