use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use hiitr::{
    config::WorkoutConfig,
    error::ConfigError,
    logging,
    mixer::AudioMixer,
    playback::{BackgroundPlayback, NoPlayback, PlaybackService, PlayerctlService, TrackInfo},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    session::WorkoutSession,
    store::{FileStateStore, StateStore},
    tone::CpalBackend,
    ui::TimerView,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

/// How often the now-playing line asks the player for its track.
const TRACK_REFRESH: Duration = Duration::from_secs(5);

const SECONDS_STEP: i32 = 5;

/// interval timer for high-intensity workouts with audio countdowns
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal HIIT timer: a preparation countdown, then alternating exercise and rest phases, with beeps before every phase change and optional control of your music player."
)]
pub struct Cli {
    /// seconds of exercise per set (1-300)
    #[clap(short = 'e', long = "exercise")]
    exercise_seconds: Option<u32>,

    /// seconds of rest between sets (1-300)
    #[clap(short = 'r', long = "rest")]
    rest_seconds: Option<u32>,

    /// number of sets (1-20)
    #[clap(short = 'n', long = "sets")]
    total_sets: Option<u32>,

    /// run without cue tones
    #[clap(long)]
    no_audio: bool,

    /// music player to control
    #[clap(long, value_enum, default_value_t = PlayerKind::None)]
    player: PlayerKind,

    /// where session state is persisted
    #[clap(long)]
    state_file: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
pub enum PlayerKind {
    None,
    Playerctl,
}

impl PlayerKind {
    fn service(&self) -> Box<dyn PlaybackService> {
        match self {
            PlayerKind::None => Box::new(NoPlayback),
            PlayerKind::Playerctl => Box::new(BackgroundPlayback::spawn(PlayerctlService::new())),
        }
    }
}

impl Cli {
    /// Apply command line overrides on top of the stored configuration.
    fn workout_config(&self, stored: WorkoutConfig) -> Result<WorkoutConfig, ConfigError> {
        WorkoutConfig::new(
            self.exercise_seconds.unwrap_or(stored.exercise_seconds),
            self.rest_seconds.unwrap_or(stored.rest_seconds),
            self.total_sets.unwrap_or(stored.total_sets),
        )
    }

    fn store(&self) -> FileStateStore {
        match &self.state_file {
            Some(path) => FileStateStore::with_path(path),
            None => FileStateStore::new(),
        }
    }
}

type Session = WorkoutSession<Box<dyn PlaybackService>, Box<dyn StateStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
}

pub struct App {
    session: Session,
    status: Option<String>,
    track: Option<TrackInfo>,
    since_track_refresh: Duration,
    audio_enabled: bool,
}

impl App {
    fn new(session: Session) -> Self {
        let audio_enabled = session.mixer().has_backend();
        Self {
            session,
            status: None,
            track: None,
            since_track_refresh: TRACK_REFRESH,
            audio_enabled,
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyOutcome::Quit;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return KeyOutcome::Quit,
            KeyCode::Char(' ') | KeyCode::Char('s') => {
                self.status = None;
                self.session.start();
            }
            KeyCode::Char('p') => {
                self.status = None;
                self.session.pause();
            }
            KeyCode::Char('r') => {
                self.status = None;
                self.session.reset();
            }
            KeyCode::Char('[') => self.adjust(|c| c.with_exercise_delta(-SECONDS_STEP)),
            KeyCode::Char(']') => self.adjust(|c| c.with_exercise_delta(SECONDS_STEP)),
            KeyCode::Char('{') => self.adjust(|c| c.with_rest_delta(-SECONDS_STEP)),
            KeyCode::Char('}') => self.adjust(|c| c.with_rest_delta(SECONDS_STEP)),
            KeyCode::Char('<') => self.adjust(|c| c.with_sets_delta(-1)),
            KeyCode::Char('>') => self.adjust(|c| c.with_sets_delta(1)),
            _ => {}
        }
        KeyOutcome::Continue
    }

    fn adjust<F: FnOnce(&WorkoutConfig) -> WorkoutConfig>(&mut self, change: F) {
        let config = change(self.session.config());
        self.status = match self.session.reconfigure(config) {
            Ok(()) => None,
            Err(err) => {
                tracing::info!(%err, "config change rejected");
                Some(err.to_string())
            }
        };
    }

    fn on_elapsed(&mut self, elapsed: Duration) {
        self.session.advance(elapsed);

        self.since_track_refresh += elapsed;
        if self.since_track_refresh >= TRACK_REFRESH {
            self.since_track_refresh = Duration::ZERO;
            self.track = self.session.playback().now_playing();
        }
    }
}

fn ui(app: &App, f: &mut Frame) {
    let snapshot = app.session.snapshot();
    let view = TimerView {
        track: app.track.as_ref(),
        status: app.status.as_deref(),
        audio_enabled: app.audio_enabled,
        ..TimerView::new(&snapshot)
    };
    f.render_widget(view, f.area());
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let store = cli.store();
    let config = match cli.workout_config(store.load_config().unwrap_or_default()) {
        Ok(config) => config,
        Err(err) => Cli::command().error(ErrorKind::ValueValidation, err).exit(),
    };

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let _log_guard = logging::init();
    tracing::info!(
        ?config,
        player = %cli.player,
        no_audio = cli.no_audio,
        state_file = ?store.path(),
        "starting hiitr"
    );

    let mixer = if cli.no_audio {
        AudioMixer::silent()
    } else {
        AudioMixer::initialize(CpalBackend::acquire)
    };
    let session = WorkoutSession::new(
        config,
        mixer,
        cli.player.service(),
        Box::new(store) as Box<dyn StateStore>,
    );
    let mut app = App::new(session);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);
    app.session.teardown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    terminal.draw(|f| ui(app, f))?;

    loop {
        let step = runner.step();
        app.on_elapsed(step.elapsed);

        if let AppEvent::Key(key) = step.event {
            if app.on_key(key) == KeyOutcome::Quit {
                break;
            }
        }
        terminal.draw(|f| ui(app, f))?;
    }

    tracing::info!("bye");
    Ok(())
}
