use std::collections::VecDeque;
use std::time::Duration;

pub const BEEP_HZ: f32 = 880.0;
pub const FINAL_BEEP_HZ: f32 = 1760.0;
pub const CHIME_HZ: [f32; 2] = [1760.0, 2093.0];

pub const BEEP_DURATION: Duration = Duration::from_millis(100);
pub const CHIME_DURATION: Duration = Duration::from_millis(150);
pub const BEEP_SPACING: Duration = Duration::from_secs(1);
pub const CHIME_GAP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CueAction {
    Beep {
        frequency_hz: f32,
        duration: Duration,
    },
    /// End marker of a sequence; fires once every tone has finished sounding.
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScheduledCue {
    at: Duration,
    action: CueAction,
}

/// Offsets of one countdown: `count` beeps a second apart, a one second gap,
/// then the two-tone start chime.
pub fn countdown_timeline(count: u32) -> Vec<(Duration, CueAction)> {
    let mut timeline = Vec::with_capacity(count as usize + 3);

    for k in 0..count {
        let frequency_hz = if k + 1 == count { FINAL_BEEP_HZ } else { BEEP_HZ };
        timeline.push((
            BEEP_SPACING * k,
            CueAction::Beep {
                frequency_hz,
                duration: BEEP_DURATION,
            },
        ));
    }

    let chime_at = BEEP_SPACING * count + CHIME_GAP;
    for (i, frequency_hz) in CHIME_HZ.into_iter().enumerate() {
        timeline.push((
            chime_at + CHIME_DURATION * i as u32,
            CueAction::Beep {
                frequency_hz,
                duration: CHIME_DURATION,
            },
        ));
    }

    timeline.push((
        chime_at + CHIME_DURATION * CHIME_HZ.len() as u32,
        CueAction::Finish,
    ));
    timeline
}

/// Single queue of pending cue events. Clearing it is the only cancellation
/// there is: nothing left in the queue can fire afterwards.
#[derive(Debug, Default)]
pub struct CueScheduler {
    elapsed: Duration,
    pending: VecDeque<ScheduledCue>,
}

impl CueScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Replace whatever is queued with a fresh timeline starting now.
    pub fn schedule(&mut self, timeline: Vec<(Duration, CueAction)>) {
        self.elapsed = Duration::ZERO;
        self.pending = timeline
            .into_iter()
            .map(|(at, action)| ScheduledCue { at, action })
            .collect();
    }

    /// Move time forward and collect every action that became due, in order.
    pub fn advance(&mut self, dt: Duration, due: &mut Vec<CueAction>) {
        if self.pending.is_empty() {
            return;
        }
        self.elapsed += dt;
        while let Some(next) = self.pending.front() {
            if next.at > self.elapsed {
                break;
            }
            if let Some(cue) = self.pending.pop_front() {
                due.push(cue.action);
            }
        }
    }

    /// Drop everything pending. Returns how many events were cancelled.
    pub fn clear(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        self.elapsed = Duration::ZERO;
        cancelled
    }

    /// Time left until the queue drains, if anything is in flight.
    pub fn remaining(&self) -> Option<Duration> {
        self.pending
            .back()
            .map(|last| last.at.saturating_sub(self.elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beeps(actions: &[CueAction]) -> Vec<f32> {
        actions
            .iter()
            .filter_map(|a| match a {
                CueAction::Beep { frequency_hz, .. } => Some(*frequency_hz),
                CueAction::Finish => None,
            })
            .collect()
    }

    #[test]
    fn three_count_timeline_shape() {
        let timeline = countdown_timeline(3);
        let offsets: Vec<u128> = timeline.iter().map(|(at, _)| at.as_millis()).collect();
        assert_eq!(offsets, vec![0, 1000, 2000, 4000, 4150, 4300]);

        let actions: Vec<CueAction> = timeline.iter().map(|(_, a)| *a).collect();
        assert_eq!(beeps(&actions), vec![880.0, 880.0, 1760.0, 1760.0, 2093.0]);
        assert_eq!(actions.last(), Some(&CueAction::Finish));
    }

    #[test]
    fn single_count_uses_high_beep() {
        let actions: Vec<CueAction> = countdown_timeline(1).into_iter().map(|(_, a)| a).collect();
        assert_eq!(beeps(&actions), vec![1760.0, 1760.0, 2093.0]);
    }

    #[test]
    fn total_duration_is_count_plus_gap_plus_chime() {
        for count in 1..=5 {
            let (last, _) = *countdown_timeline(count).last().unwrap();
            assert_eq!(
                last,
                Duration::from_secs(count as u64 + 1) + Duration::from_millis(300)
            );
        }
    }

    #[test]
    fn advance_releases_events_in_time() {
        let mut s = CueScheduler::new();
        s.schedule(countdown_timeline(3));
        let mut due = Vec::new();

        s.advance(Duration::ZERO, &mut due);
        assert_eq!(beeps(&due), vec![880.0]);

        s.advance(Duration::from_millis(999), &mut due);
        assert_eq!(due.len(), 1);

        s.advance(Duration::from_millis(1), &mut due);
        assert_eq!(due.len(), 2);

        s.advance(Duration::from_secs(10), &mut due);
        assert_eq!(due.len(), 6);
        assert!(!s.is_in_flight());
    }

    #[test]
    fn clear_cancels_pending_events() {
        let mut s = CueScheduler::new();
        s.schedule(countdown_timeline(3));
        let mut due = Vec::new();
        s.advance(Duration::from_millis(1500), &mut due);
        assert_eq!(due.len(), 2);

        assert_eq!(s.clear(), 4);
        assert!(!s.is_in_flight());
        s.advance(Duration::from_secs(10), &mut due);
        assert_eq!(due.len(), 2);
    }

    #[test]
    fn remaining_tracks_queue_tail() {
        let mut s = CueScheduler::new();
        assert_eq!(s.remaining(), None);
        s.schedule(countdown_timeline(2));
        let mut due = Vec::new();
        s.advance(Duration::from_secs(1), &mut due);
        assert_eq!(s.remaining(), Some(Duration::from_millis(2300)));
    }
}
