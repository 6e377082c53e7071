pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyModifiers, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    Terminal,
};
use reflex_grid::{
    analytics,
    clock::{Clock, SystemClock},
    config::{ConfigOverrides, ConfigStore, Difficulty, FileConfigStore, Settings},
    error::GameError,
    events::GameEvent,
    feedback::Feedback,
    grid::CellId,
    history::HistoryDb,
    runtime::{CrosstermInputSource, FixedTicker, GameInput, Runner},
    session::{GameResult, GameSession, SessionRecord, SessionState},
};
use std::{
    error::Error,
    fs::File,
    io::{self, stdin, Write},
    path::PathBuf,
    sync::mpsc::Receiver,
    time::Duration,
};

/// Upper bound on how late a deadline is noticed
const TICK_RATE_MS: u64 = 15;

/// reaction grid: click the lit cell before the computer scores
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    version,
    about,
    long_about = "A terminal reaction game. One cell of the grid lights up at a time; click it before the timer runs out or the computer takes the point. Finished games are kept in a local history with performance analytics."
)]
pub struct Cli {
    /// cells per side of the square grid
    #[clap(short = 'g', long)]
    grid_size: Option<usize>,

    /// milliseconds to hit the lit cell
    #[clap(short = 'r', long = "reaction-ms")]
    reaction_ms: Option<u64>,

    /// milliseconds between rounds
    #[clap(short = 'i', long = "interval-ms")]
    interval_ms: Option<u64>,

    /// score that ends the game
    #[clap(short = 'm', long)]
    max_score: Option<u32>,

    /// timing preset; explicit timings override it
    #[clap(short = 'd', long, value_enum)]
    difficulty: Option<Difficulty>,

    /// no terminal bell
    #[clap(long)]
    mute: bool,

    /// print a summary of past games and exit
    #[clap(long)]
    history: bool,

    /// write past games as JSON to PATH and exit
    #[clap(long, value_name = "PATH")]
    export_json: Option<PathBuf>,

    /// write past games as CSV to PATH and exit
    #[clap(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,

    /// add games from a JSON export and exit
    #[clap(long, value_name = "PATH")]
    import_json: Option<PathBuf>,

    /// delete all recorded games and exit
    #[clap(long)]
    clear_history: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            grid_size: self.grid_size,
            reaction_time_ms: self.reaction_ms,
            round_interval_ms: self.interval_ms,
            max_score: self.max_score,
            difficulty: self.difficulty,
        }
    }

    fn is_history_command(&self) -> bool {
        self.history
            || self.clear_history
            || self.export_json.is_some()
            || self.export_csv.is_some()
            || self.import_json.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Game,
    Results,
    History,
}

pub struct App<C: Clock = SystemClock> {
    pub session: GameSession<C>,
    pub state: AppState,
    pub settings: Settings,
    pub feedback: Feedback,
    pub status: Option<String>,
    pub cursor: CellId,
    /// Recorded games, oldest first
    pub records: Vec<SessionRecord>,
    history: Option<HistoryDb>,
    store: Option<Box<dyn ConfigStore>>,
    events: Receiver<GameEvent>,
    bell: bool,
}

impl<C: Clock> App<C> {
    pub fn new(settings: Settings, clock: C, history: Option<HistoryDb>) -> Result<Self, GameError> {
        let mut session = GameSession::new(settings.game, clock)?;
        let events = session.subscribe_events();

        let records = match &history {
            Some(db) => db.sessions().unwrap_or_else(|e| {
                warn!("could not load history: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Ok(Self {
            session,
            state: AppState::Game,
            settings,
            feedback: Feedback::new(settings.muted),
            status: None,
            cursor: CellId::new(0, 0),
            records,
            history,
            store: None,
            events,
            bell: false,
        })
    }

    /// Persist settings changes made from the keyboard
    pub fn with_store(mut self, store: Box<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Handle one input; returns true when the app should exit.
    pub fn handle_input(&mut self, input: GameInput, area: Rect) -> bool {
        let quit = match input {
            GameInput::Tick => {
                self.session.tick();
                false
            }
            GameInput::Resize => false,
            GameInput::Mouse(mouse) => {
                self.on_mouse(mouse, area);
                false
            }
            GameInput::Key(key) => self.on_key(key),
        };
        self.drain_events();
        quit
    }

    /// True once per cue that asked for a sound
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }

    fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return true;
        }

        match self.state {
            AppState::Game => self.on_game_key(key),
            AppState::Results => match key.code {
                KeyCode::Char('s') => {
                    self.session.reset();
                    self.session.start();
                    self.state = AppState::Game;
                }
                KeyCode::Char('r') => {
                    self.session.reset();
                    self.state = AppState::Game;
                }
                KeyCode::Char('h') => self.state = AppState::History,
                _ => {}
            },
            AppState::History => match key.code {
                KeyCode::Char('h') | KeyCode::Char('b') | KeyCode::Backspace => {
                    self.state = if self.session.state() == SessionState::Finished {
                        AppState::Results
                    } else {
                        AppState::Game
                    };
                }
                _ => {}
            },
        }
        false
    }

    fn on_game_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('s') => {
                self.status = None;
                self.session.start();
            }
            KeyCode::Char('p') => match self.session.state() {
                SessionState::Playing => self.session.pause(),
                SessionState::Paused => self.session.resume(),
                _ => {}
            },
            KeyCode::Char('x') => self.session.stop(),
            KeyCode::Char('r') => {
                self.status = None;
                self.session.reset();
            }
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.change_config(ConfigOverrides::difficulty(Difficulty::ALL[idx]));
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.resize_grid(1),
            KeyCode::Char('-') => self.resize_grid(-1),
            KeyCode::Char('m') => {
                self.settings.muted = self.feedback.toggle_mute();
                self.save_settings();
            }
            KeyCode::Char('h') => self.state = AppState::History,
            KeyCode::Up => self.move_cursor(-1, 0),
            KeyCode::Down => self.move_cursor(1, 0),
            KeyCode::Left => self.move_cursor(0, -1),
            KeyCode::Right => self.move_cursor(0, 1),
            KeyCode::Enter | KeyCode::Char(' ') => self.session.handle_cell_click(self.cursor),
            _ => {}
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent, area: Rect) {
        if self.state != AppState::Game {
            return;
        }
        if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
            let size = self.session.grid().size();
            if let Some(id) = ui::hit_test(area, size, mouse.column, mouse.row) {
                self.cursor = id;
                self.session.handle_cell_click(id);
            }
        }
    }

    fn move_cursor(&mut self, d_row: isize, d_col: isize) {
        let last = self.session.grid().size().saturating_sub(1);
        let step = |v: usize, d: isize| v.saturating_add_signed(d).min(last);
        self.cursor = CellId::new(step(self.cursor.row, d_row), step(self.cursor.col, d_col));
    }

    fn resize_grid(&mut self, delta: isize) {
        let size = self.session.pending_config().grid_size;
        let Some(size) = size.checked_add_signed(delta).filter(|s| *s > 0) else {
            return;
        };
        self.change_config(ConfigOverrides {
            grid_size: Some(size),
            ..ConfigOverrides::default()
        });
    }

    /// Settings changes apply to the board right away while Idle.
    fn change_config(&mut self, overrides: ConfigOverrides) {
        if self.session.state() != SessionState::Idle {
            self.status = Some(String::from("stop the game to change settings"));
            return;
        }

        let applied = self.session.update_config(overrides).and_then(|_| {
            let pending = *self.session.pending_config();
            self.session.initialize(ConfigOverrides::from(pending))
        });
        match applied {
            Ok(()) => {
                self.settings.game = *self.session.config();
                let last = self.settings.game.grid_size - 1;
                self.cursor = CellId::new(self.cursor.row.min(last), self.cursor.col.min(last));
                self.status = None;
                self.save_settings();
            }
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    fn save_settings(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.settings) {
                warn!("could not save settings: {e}");
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let Some(cue) = self.feedback.on_event(&event) {
                self.bell |= cue.sound.is_some();
                if cue.message.is_some() {
                    self.status = cue.message;
                }
            }
            if let GameEvent::Finished { .. } = event {
                self.finish();
            }
        }
    }

    fn finish(&mut self) {
        if let Some(record) = self.session.session_record() {
            if let Some(db) = self.history.as_mut() {
                if let Err(e) = db.record_session(&record) {
                    warn!("could not record session: {e}");
                }
            }
            self.records.push(record);
        }
        self.state = AppState::Results;
    }
}

/// Run the non-interactive history commands, writing a report to `out`.
fn run_history_command<W: Write>(
    cli: &Cli,
    db: &mut HistoryDb,
    out: &mut W,
) -> Result<(), GameError> {
    if cli.clear_history {
        db.clear_all()?;
        writeln!(out, "history cleared")?;
    }

    if let Some(path) = &cli.import_json {
        let records = analytics::import_json(File::open(path)?)?;
        for record in &records {
            db.record_session(record)?;
        }
        writeln!(out, "imported {} sessions from {}", records.len(), path.display())?;
    }

    if let Some(path) = &cli.export_json {
        let records = db.sessions()?;
        analytics::export_json(&records, File::create(path)?)?;
        writeln!(out, "exported {} sessions to {}", records.len(), path.display())?;
    }

    if let Some(path) = &cli.export_csv {
        let records = db.sessions()?;
        analytics::export_csv(&records, File::create(path)?)?;
        writeln!(out, "exported {} sessions to {}", records.len(), path.display())?;
    }

    if cli.history {
        write!(out, "{}", history_summary(&db.sessions()?))?;
    }

    Ok(())
}

fn history_summary(records: &[SessionRecord]) -> String {
    if records.is_empty() {
        return String::from("no games recorded yet\n");
    }

    let wins = records
        .iter()
        .filter(|r| r.result == GameResult::PlayerWin)
        .count();
    let m = analytics::performance_metrics(records);

    let mut summary = format!(
        "{} games, {} won\navg {:.0}ms   consistency {:.0}   trend {:+.1}   streak {}   efficiency {:.0}\n",
        records.len(),
        wins,
        m.average_reaction_time,
        m.consistency_score,
        m.improvement_trend,
        m.streak_length,
        m.efficiency_rating
    );
    for (difficulty, m) in analytics::metrics_by_difficulty(records) {
        summary.push_str(&format!(
            "  {:<7} avg {:.0}ms   efficiency {:.0}\n",
            difficulty.to_string(),
            m.average_reaction_time,
            m.efficiency_rating
        ));
    }
    summary
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.is_history_command() {
        let mut db = HistoryDb::open_default()?;
        run_history_command(&cli, &mut db, &mut io::stdout())?;
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let mut settings = store.load();
    settings.game = cli.overrides().apply(&settings.game);
    settings.muted |= cli.mute;
    if let Err(e) = settings.game.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::ValueValidation, e).exit();
    }
    if let Err(e) = store.save(&settings) {
        warn!("could not save settings to {}: {e}", store.path().display());
    }

    let history = match HistoryDb::open_default() {
        Ok(db) => Some(db),
        Err(e) => {
            warn!("history disabled: {e}");
            None
        }
    };

    let mut app = App::new(settings, SystemClock::new(), history)?.with_store(Box::new(store));
    info!("starting with {:?}", settings.game);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, C: Clock>(
    terminal: &mut Terminal<B>,
    app: &mut App<C>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermInputSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| ui::draw(app, f))?;

    loop {
        let input = runner.step();
        let size = terminal.size()?;
        let area = Rect::new(0, 0, size.width, size.height);

        if app.handle_input(input, area) {
            break;
        }
        if app.take_bell() {
            print!("\x07");
            io::stdout().flush()?;
        }

        terminal.draw(|f| ui::draw(app, f))?;
    }

    Ok(())
}
