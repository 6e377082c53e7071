//! Session state machine.
//!
//! `GameSession` owns the grid, stats, config and the round scheduler. Every
//! command and every fired timer runs the same step: read the current state,
//! compute the next one, publish exactly one new [`Snapshot`] and then the
//! events describing the change.
//!
//! Commands issued in a state that forbids them are ignored, and so are
//! resolutions that arrive for a round that is no longer open.
//!
//! Pausing holds the pending timer with its remaining time; resuming re-arms
//! it with that remainder. The paused interval does not count towards the
//! player's reaction time.

use chrono::{DateTime, Local};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigOverrides, Difficulty, GameConfig};
use crate::error::Result;
use crate::events::{GameEvent, Publisher};
use crate::grid::{Cell, CellId, Grid};
use crate::scheduler::{Resolution, Round, RoundResult, RoundScheduler, TimerKind};
use crate::stats::{apply_computer_win, apply_player_win, Stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Idle,
    Playing,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameResult {
    PlayerWin,
    ComputerWin,
}

/// Immutable point-in-time view of the session
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Increments with every published snapshot
    pub version: u64,
    pub state: SessionState,
    pub grid: Grid,
    pub stats: Stats,
    /// Config the current grid and game run with
    pub config: GameConfig,
    /// Config the next `start` will adopt
    pub pending_config: GameConfig,
    pub active_cell: Option<Cell>,
    pub round: Option<Round>,
    pub result: Option<GameResult>,
}

/// Completed game, handed to the history collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub difficulty: Difficulty,
    pub final_stats: Stats,
    pub result: GameResult,
    pub rounds: Vec<Round>,
}

pub struct GameSession<C: Clock = SystemClock> {
    clock: C,
    state: SessionState,
    grid: Grid,
    stats: Stats,
    config: GameConfig,
    pending_config: GameConfig,
    scheduler: RoundScheduler,
    rounds: Vec<Round>,
    session_id: Uuid,
    started_at: Option<DateTime<Local>>,
    ended_at: Option<DateTime<Local>>,
    result: Option<GameResult>,
    version: u64,
    current: Arc<Snapshot>,
    snapshots: Publisher<Arc<Snapshot>>,
    events: Publisher<GameEvent>,
}

impl<C: Clock> std::fmt::Debug for GameSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("state", &self.state)
            .field("stats", &self.stats)
            .field("config", &self.config)
            .field("version", &self.version)
            .finish()
    }
}

impl<C: Clock> GameSession<C> {
    /// Create an Idle session with a fresh grid for `config`.
    pub fn new(config: GameConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let grid = Grid::new(config.grid_size)?;
        let stats = Stats::new();

        let current = Arc::new(Snapshot {
            version: 0,
            state: SessionState::Idle,
            grid: grid.clone(),
            stats,
            config,
            pending_config: config,
            active_cell: None,
            round: None,
            result: None,
        });

        Ok(Self {
            clock,
            state: SessionState::Idle,
            grid,
            stats,
            config,
            pending_config: config,
            scheduler: RoundScheduler::new(),
            rounds: Vec::new(),
            session_id: Uuid::new_v4(),
            started_at: None,
            ended_at: None,
            result: None,
            version: 0,
            current,
            snapshots: Publisher::new(),
            events: Publisher::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn pending_config(&self) -> &GameConfig {
        &self.pending_config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.scheduler.open_round()
    }

    pub fn active_cell(&self) -> Option<Cell> {
        self.scheduler
            .open_round()
            .and_then(|r| self.grid.cell(r.cell.id).copied())
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The most recently published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current)
    }

    /// Subscribe to snapshots. The current snapshot is delivered first.
    pub fn subscribe_snapshots(&mut self) -> Receiver<Arc<Snapshot>> {
        self.snapshots.subscribe_with(Arc::clone(&self.current))
    }

    pub fn subscribe_events(&mut self) -> Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Rebuild the session from defaults merged with `overrides`. Idle only.
    pub fn initialize(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if self.state != SessionState::Idle {
            self.ignored("initialize");
            return Ok(());
        }

        let config = overrides.apply(&GameConfig::default());
        config.validate()?;
        let grid = Grid::new(config.grid_size)?;

        self.scheduler.cancel();
        self.config = config;
        self.pending_config = config;
        self.grid = grid;
        self.stats = Stats::new();
        self.rounds.clear();
        self.result = None;

        info!(
            "game initialized: {}x{} grid, {}ms to react, first to {}",
            config.grid_size, config.grid_size, config.reaction_time_ms, config.max_score
        );
        self.commit(vec![GameEvent::Initialized { config }]);
        Ok(())
    }

    /// Idle → Playing. Opens the first round immediately.
    pub fn start(&mut self) {
        if self.state != SessionState::Idle {
            self.ignored("start");
            return;
        }

        let config = self.pending_config;
        let grid = match Grid::new(config.grid_size) {
            Ok(grid) => grid,
            Err(e) => {
                debug!("start ignored: {}", e);
                return;
            }
        };

        self.config = config;
        self.grid = grid;
        self.stats = Stats::new();
        self.rounds.clear();
        self.result = None;
        self.session_id = Uuid::new_v4();
        self.started_at = Some(Local::now());
        self.ended_at = None;
        self.state = SessionState::Playing;
        self.scheduler.begin();

        info!("game {} started ({})", self.session_id, config.difficulty);

        let mut events = vec![GameEvent::Started];
        let now = self.clock.now_ms();
        events.extend(self.open_round(now));
        self.commit(events);
    }

    /// Playing → Paused. The pending timer is held with its remaining time.
    pub fn pause(&mut self) {
        self.fire_due();
        if self.state != SessionState::Playing {
            self.ignored("pause");
            return;
        }

        self.scheduler.suspend(self.clock.now_ms());
        self.state = SessionState::Paused;
        self.commit(vec![GameEvent::Paused]);
    }

    /// Paused → Playing. The held timer is re-armed with what was left of it.
    pub fn resume(&mut self) {
        if self.state != SessionState::Paused {
            self.ignored("resume");
            return;
        }

        let now = self.clock.now_ms();
        self.scheduler.resume(now);
        self.state = SessionState::Playing;

        let mut events = vec![GameEvent::Resumed];
        if self.scheduler.armed().is_none() {
            events.extend(self.open_round(now));
        }
        self.commit(events);
        self.fire_due();
    }

    /// Any state → Idle. Cancels every timer and clears the board and any
    /// result; stats stay.
    pub fn stop(&mut self) {
        self.scheduler.cancel();
        self.grid = self.fresh_grid();
        self.result = None;
        self.state = SessionState::Idle;
        info!("game {} stopped", self.session_id);
        self.commit(vec![GameEvent::Stopped]);
    }

    /// Any state → Idle with a clean board and zeroed stats.
    pub fn reset(&mut self) {
        self.scheduler.cancel();
        self.grid = self.fresh_grid();
        self.stats = Stats::new();
        self.rounds.clear();
        self.result = None;
        self.ended_at = None;
        self.state = SessionState::Idle;
        self.commit(vec![GameEvent::Reset]);
    }

    /// Player path of the round race.
    pub fn handle_cell_click(&mut self, cell_id: CellId) {
        // A deadline that has already passed wins over a late click.
        self.fire_due();
        if self.state != SessionState::Playing {
            self.ignored("cell click");
            return;
        }

        let now = self.clock.now_ms();
        if let Some(resolution) = self.scheduler.resolve_click(&self.grid, cell_id, now) {
            self.apply_resolution(resolution, now);
        }
    }

    /// Merge `overrides` into the config the next `initialize`/`start` uses.
    pub fn update_config(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if self.state == SessionState::Finished {
            self.ignored("update_config");
            return Ok(());
        }

        let config = overrides.apply(&self.pending_config);
        config.validate()?;
        self.pending_config = config;
        self.commit(vec![GameEvent::ConfigUpdated { config }]);
        Ok(())
    }

    /// Fire every timer that is due. Called by the driver on each tick.
    pub fn tick(&mut self) {
        self.fire_due();
    }

    /// Record of the finished game, once there is one
    pub fn session_record(&self) -> Option<SessionRecord> {
        if self.state != SessionState::Finished {
            return None;
        }
        Some(SessionRecord {
            id: self.session_id,
            started_at: self.started_at?,
            ended_at: self.ended_at,
            difficulty: self.config.difficulty,
            final_stats: self.stats,
            result: self.result?,
            rounds: self.rounds.clone(),
        })
    }

    fn fresh_grid(&self) -> Grid {
        Grid::new(self.config.grid_size).unwrap_or_else(|_| self.grid.clone())
    }

    fn ignored(&self, command: &str) {
        debug!("{} ignored while {}", command, self.state);
    }

    fn fire_due(&mut self) {
        let now = self.clock.now_ms();
        while let Some(timer) = self.scheduler.poll(now) {
            if self.state != SessionState::Playing {
                debug!("timer fired outside play, dropped");
                continue;
            }
            match timer.kind {
                TimerKind::Deadline => {
                    if let Some(resolution) =
                        self.scheduler.resolve_timeout(&self.grid, &timer, now)
                    {
                        self.apply_resolution(resolution, now);
                    }
                }
                TimerKind::NextRound => {
                    if self.scheduler.is_current(&timer) {
                        let events = self.open_round(now).into_iter().collect();
                        self.commit(events);
                    }
                }
            }
        }
    }

    fn open_round(&mut self, now: u64) -> Option<GameEvent> {
        let (grid, round) = self.scheduler.start_round(
            &self.grid,
            self.config.reaction_time_ms,
            now,
            &mut rand::thread_rng(),
        )?;
        self.grid = grid;
        Some(GameEvent::RoundStarted {
            round_number: round.round_number,
            cell: round.cell,
        })
    }

    fn apply_resolution(&mut self, resolution: Resolution, now: u64) {
        let Resolution { round, cell, grid } = resolution;
        self.grid = grid;
        self.rounds.push(round);

        let mut events = Vec::with_capacity(2);
        match (round.result, round.reaction_time_ms) {
            (Some(RoundResult::Success), Some(reaction_time_ms)) => {
                self.stats = apply_player_win(&self.stats, reaction_time_ms);
                debug!("round {} won in {}ms", round.round_number, reaction_time_ms);
                events.push(GameEvent::PlayerSuccess {
                    reaction_time_ms,
                    cell,
                });
            }
            _ => {
                self.stats = apply_computer_win(&self.stats);
                debug!("round {} timed out", round.round_number);
                events.push(GameEvent::ComputerWin { cell });
            }
        }

        match self.winner() {
            Some(result) => {
                self.scheduler.cancel();
                self.state = SessionState::Finished;
                self.result = Some(result);
                self.ended_at = Some(Local::now());
                info!(
                    "game {} finished: {} ({} - {})",
                    self.session_id, result, self.stats.player_score, self.stats.computer_score
                );
                events.push(GameEvent::Finished {
                    result,
                    stats: self.stats,
                });
            }
            None => self
                .scheduler
                .schedule_next(now, self.config.round_interval_ms),
        }

        self.commit(events);
    }

    fn winner(&self) -> Option<GameResult> {
        if self.stats.player_score >= self.config.max_score {
            Some(GameResult::PlayerWin)
        } else if self.stats.computer_score >= self.config.max_score {
            Some(GameResult::ComputerWin)
        } else {
            None
        }
    }

    /// Publish one snapshot of the current state, then `events` in order.
    fn commit(&mut self, events: Vec<GameEvent>) {
        self.version += 1;
        self.current = Arc::new(Snapshot {
            version: self.version,
            state: self.state,
            grid: self.grid.clone(),
            stats: self.stats,
            config: self.config,
            pending_config: self.pending_config,
            active_cell: self.active_cell(),
            round: self.scheduler.open_round().copied(),
            result: self.result,
        });
        self.snapshots.publish(Arc::clone(&self.current));

        for event in events {
            debug!("event {}", event.tag());
            self.events.publish(event);
        }
    }
}
