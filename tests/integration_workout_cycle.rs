use std::time::Duration;

use hiitr::{
    config::WorkoutConfig,
    mixer::{AudioMixer, Bus},
    phase::{Phase, SessionState, PREPARATION_SECONDS},
    playback::{PlaybackCall, RecordingPlayback},
    session::WorkoutSession,
    store::{FileStateStore, MemoryStateStore, StateStore},
    tone::RecordingBackend,
};
use tempfile::tempdir;

struct Harness {
    session: WorkoutSession<RecordingPlayback, MemoryStateStore>,
    tones: RecordingBackend,
    player: RecordingPlayback,
}

fn harness(config: WorkoutConfig) -> Harness {
    let tones = RecordingBackend::new();
    let player = RecordingPlayback::new();
    let session = WorkoutSession::new(
        config,
        AudioMixer::new(Some(Box::new(tones.clone()))),
        player.clone(),
        MemoryStateStore::new(),
    );
    Harness {
        session,
        tones,
        player,
    }
}

fn seconds(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn full_cycle_reaches_completed_after_exact_tick_count() {
    for exercise in [1, 2, 7, 30, 300] {
        for rest in [1, 4, 10, 300] {
            for sets in [1, 2, 3, 20] {
                let config = WorkoutConfig::new(exercise, rest, sets).unwrap();
                let mut h = harness(config);
                h.session.start();

                let total = config.total_ticks(PREPARATION_SECONDS);
                for n in 1..=total {
                    assert_ne!(
                        h.session.state().phase,
                        Phase::Completed,
                        "{config:?} completed early at tick {n}"
                    );
                    h.session.tick();

                    let snap = h.session.snapshot();
                    assert!(snap.remaining_seconds <= snap.phase_duration());
                }

                let state = h.session.state();
                assert_eq!(state.phase, Phase::Completed, "{config:?}");
                assert_eq!(state.current_set, sets);
                assert!(!state.is_running);
                assert_eq!(h.session.tick(), None);
            }
        }
    }
}

#[test]
fn phases_follow_the_expected_order() {
    let mut h = harness(WorkoutConfig::new(3, 2, 3).unwrap());
    h.session.start();

    let mut seen = Vec::new();
    for _ in 0..100 {
        if let Some(t) = h.session.tick() {
            seen.push((t.to, t.set));
        }
        if h.session.state().phase == Phase::Completed {
            break;
        }
    }
    assert_eq!(
        seen,
        vec![
            (Phase::Exercising, 1),
            (Phase::Resting, 1),
            (Phase::Exercising, 2),
            (Phase::Resting, 2),
            (Phase::Exercising, 3),
            (Phase::Completed, 3),
        ]
    );
}

#[test]
fn reset_while_resting_in_second_set() {
    let mut h = harness(WorkoutConfig::new(5, 8, 3).unwrap());
    h.session.start();
    // prep 10, exercise 5, rest 8, exercise 5, then 2 s into the second rest
    h.session.advance(seconds(10 + 5 + 8 + 5 + 2));
    assert_eq!(h.session.state().phase, Phase::Resting);
    assert_eq!(h.session.state().current_set, 2);
    assert!(h.session.mixer().cue_in_flight());

    h.session.reset();
    assert_eq!(*h.session.state(), SessionState::initial());
    assert!(!h.session.mixer().cue_in_flight());

    let emitted = h.tones.tones().len();
    h.session.advance(seconds(60));
    assert_eq!(h.tones.tones().len(), emitted, "tone after reset");
    assert_eq!(*h.session.state(), SessionState::initial());
}

#[test]
fn pause_then_start_resumes_where_it_stopped() {
    let mut h = harness(WorkoutConfig::new(20, 10, 2).unwrap());
    h.session.start();
    h.session.advance(seconds(17));
    let before = *h.session.state();
    assert_eq!(before.phase, Phase::Exercising);

    h.session.pause();
    h.session.start();
    let after = *h.session.state();
    assert_eq!(after.phase, before.phase);
    assert_eq!(after.remaining_seconds, before.remaining_seconds);
    assert_eq!(after.current_set, before.current_set);

    h.session.advance(seconds(before.remaining_seconds as u64));
    assert_eq!(h.session.state().phase, Phase::Resting);
}

#[test]
fn reconfigure_mid_session_applies_to_following_phases() {
    let mut h = harness(WorkoutConfig::default());
    h.session.start();
    h.session.advance(seconds(25));
    assert_eq!(h.session.state().phase, Phase::Exercising);

    let config = WorkoutConfig::new(45, 15, 5).unwrap();
    h.session.reconfigure(config).unwrap();
    assert_eq!(*h.session.state(), SessionState::initial());

    h.session.start();
    h.session.advance(seconds(10));
    assert_eq!(h.session.state().phase, Phase::Exercising);
    assert_eq!(h.session.state().remaining_seconds, 45);
    h.session.advance(seconds(45));
    assert_eq!(h.session.state().phase, Phase::Resting);
    assert_eq!(h.session.state().remaining_seconds, 15);

    h.session.advance(seconds((config.total_ticks(PREPARATION_SECONDS) - 55) as u64));
    assert_eq!(h.session.state().phase, Phase::Completed);
    assert_eq!(h.session.state().current_set, 5);
}

#[test]
fn music_follows_the_workout() {
    let mut h = harness(WorkoutConfig::new(10, 10, 2).unwrap());
    h.session.start();
    assert_eq!(h.session.mixer().volume(Bus::Music), 0.7);

    h.session.advance(seconds(10));
    assert_eq!(h.session.mixer().volume(Bus::Music), 0.85);
    let transport = |p: &RecordingPlayback| {
        p.calls()
            .into_iter()
            .filter(|c| !matches!(c, PlaybackCall::SetVolume(_)))
            .collect::<Vec<_>>()
    };
    assert!(transport(&h.player).is_empty());

    // the exercise cue ends 4.3 s after the transition
    h.session.advance(Duration::from_millis(4300));
    assert_eq!(transport(&h.player), vec![PlaybackCall::Play]);

    h.session.advance(seconds(6));
    assert_eq!(h.session.state().phase, Phase::Resting);
    assert_eq!(h.session.mixer().volume(Bus::Music), 1.0);
    assert_eq!(h.session.mixer().volume(Bus::Cue), 0.9);
    assert_eq!(
        h.player.calls().last(),
        Some(&PlaybackCall::SetVolume(1.0))
    );

    h.session.pause();
    assert_eq!(
        transport(&h.player),
        vec![PlaybackCall::Play, PlaybackCall::Pause]
    );
    h.session.start();
    h.session.advance(seconds(1));
    assert_eq!(h.session.mixer().volume(Bus::Music), 1.0);
    assert_eq!(
        transport(&h.player),
        vec![PlaybackCall::Play, PlaybackCall::Pause, PlaybackCall::Resume]
    );
}

#[test]
fn collaborator_failures_never_change_timing() {
    let config = WorkoutConfig::new(4, 3, 3).unwrap();
    let mut reference = harness(config);

    let player = RecordingPlayback::new();
    player.fail_all();
    let store = MemoryStateStore::new();
    store.fail_writes();
    let mut broken = WorkoutSession::new(config, AudioMixer::silent(), player, store);

    reference.session.start();
    broken.start();
    for _ in 0..(config.total_ticks(PREPARATION_SECONDS) * 4) {
        reference.session.advance(Duration::from_millis(250));
        broken.advance(Duration::from_millis(250));
        assert_eq!(reference.session.state(), broken.state());
    }
    assert_eq!(broken.state().phase, Phase::Completed);
}

#[test]
fn config_survives_restart_through_file_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut first = WorkoutSession::new(
        WorkoutConfig::default(),
        AudioMixer::silent(),
        RecordingPlayback::new(),
        FileStateStore::with_path(&path),
    );
    first.start();
    first.advance(seconds(3));
    first.reconfigure(WorkoutConfig::new(40, 20, 6).unwrap()).unwrap();
    first.start();
    first.advance(seconds(2));
    first.teardown();

    let stored = FileStateStore::with_path(&path);
    assert_eq!(stored.load().unwrap().snapshot.remaining_seconds, 8);

    let second = WorkoutSession::restore(AudioMixer::silent(), RecordingPlayback::new(), stored);
    assert_eq!(*second.config(), WorkoutConfig::new(40, 20, 6).unwrap());
    assert_eq!(*second.state(), SessionState::initial());
    assert_eq!(
        second.store().load_config(),
        Some(WorkoutConfig::new(40, 20, 6).unwrap())
    );
}

#[cfg(unix)]
#[test]
fn slow_player_never_holds_up_the_clock() {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Instant;

    use hiitr::playback::{BackgroundPlayback, PlayerctlService};

    let dir = tempdir().unwrap();
    let script = dir.path().join("slow-player");
    std::fs::write(&script, "#!/bin/sh\nsleep 3\necho Playing\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let player = PlayerctlService::with_program(script.to_string_lossy().into_owned());
    let mut session = WorkoutSession::new(
        WorkoutConfig::default(),
        AudioMixer::silent(),
        BackgroundPlayback::spawn(player),
        MemoryStateStore::new(),
    );

    let started = Instant::now();
    session.start();
    session.advance(seconds(15));
    session.pause();
    session.start();
    session.advance(seconds(1));
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(session.state().phase, Phase::Exercising);
    assert_eq!(session.state().remaining_seconds, 24);
}
