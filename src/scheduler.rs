//! Round scheduler: picks the next cell, arms the deadline and decides each
//! round exactly once.
//!
//! The scheduler never reads a clock. Callers pass `now` in, poll for due
//! timers and feed the fired timer back, which keeps the whole race
//! deterministic under a logical clock.
//!
//! ```text
//! WaitingForNextRound --start_round--> RoundActive --resolve_*--> (resolved)
//!          ^                                                    |
//!          +------------------- schedule_next ------------------+
//! ```
//!
//! A round is decided by whichever of the click path or the deadline path
//! reaches `take_open_round` first. The loser finds no open round (or a round
//! whose deadline token no longer matches) and is dropped.

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::grid::{Cell, CellId, Grid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoundResult {
    /// The player clicked the active cell before the deadline
    Success,
    /// The deadline elapsed with the round still open
    Timeout,
}

/// One activation-to-resolution cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub round_number: u32,
    /// The cell as it was when activated
    pub cell: Cell,
    pub start_time: u64,
    pub end_time: Option<u64>,
    pub reaction_time_ms: Option<u64>,
    /// `None` while the round is open
    pub result: Option<RoundResult>,
}

impl Round {
    pub fn is_open(&self) -> bool {
        self.result.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Expiry of the open round
    Deadline,
    /// End of the pause between rounds
    NextRound,
}

/// Identity of an armed timer. A fired timer is honoured only while its token
/// is still the one the scheduler expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    generation: u64,
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub kind: TimerKind,
    pub due_at: u64,
    pub token: TimerToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No round open and nothing scheduled
    Halted,
    WaitingForNextRound,
    RoundActive,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    /// The closed round, result filled in
    pub round: Round,
    /// The cell in its resolved state
    pub cell: Cell,
    pub grid: Grid,
}

#[derive(Debug, Clone, Copy)]
struct OpenRound {
    round: Round,
    deadline: TimerToken,
}

#[derive(Debug, Clone, Copy)]
struct Suspended {
    kind: TimerKind,
    remaining_ms: u64,
    paused_at: u64,
}

#[derive(Debug, Default)]
pub struct RoundScheduler {
    generation: u64,
    next_seq: u64,
    next_round_number: u32,
    open: Option<OpenRound>,
    armed: Option<Timer>,
    suspended: Option<Suspended>,
}

impl RoundScheduler {
    pub fn new() -> Self {
        Self {
            next_round_number: 1,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        if self.open.is_some() {
            Phase::RoundActive
        } else if self.armed.is_some() || self.suspended.is_some() {
            Phase::WaitingForNextRound
        } else {
            Phase::Halted
        }
    }

    pub fn open_round(&self) -> Option<&Round> {
        self.open.as_ref().map(|o| &o.round)
    }

    pub fn armed(&self) -> Option<Timer> {
        self.armed
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.is_some()
    }

    /// Forget everything and start numbering rounds from 1 again.
    pub fn begin(&mut self) {
        self.cancel();
        self.next_round_number = 1;
    }

    /// Drop the open round and every pending timer. Timers fired from the old
    /// generation are ignored afterwards.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.open = None;
        self.armed = None;
        self.suspended = None;
    }

    fn arm(&mut self, kind: TimerKind, due_at: u64) -> TimerToken {
        self.next_seq += 1;
        let token = TimerToken {
            generation: self.generation,
            seq: self.next_seq,
        };
        self.armed = Some(Timer {
            kind,
            due_at,
            token,
        });
        token
    }

    /// Activate a random Idle cell and arm its deadline.
    ///
    /// Returns the grid with the cell marked Active and the new open round,
    /// or `None` when a round is already open or no cell is available.
    pub fn start_round<R: Rng + ?Sized>(
        &mut self,
        grid: &Grid,
        reaction_time_ms: u64,
        now: u64,
        rng: &mut R,
    ) -> Option<(Grid, Round)> {
        if self.open.is_some() {
            debug!("start_round ignored: a round is already open");
            return None;
        }

        let available = grid.available_cells();
        let Some(chosen) = available.choose(rng) else {
            debug!("start_round ignored: no available cells");
            return None;
        };

        let cell = chosen.activated(now);
        let round = Round {
            round_number: self.next_round_number,
            cell,
            start_time: now,
            end_time: None,
            reaction_time_ms: None,
            result: None,
        };
        self.next_round_number += 1;
        self.suspended = None;

        let due_at = now.saturating_add(reaction_time_ms);
        let deadline = self.arm(TimerKind::Deadline, due_at);
        self.open = Some(OpenRound { round, deadline });

        debug!(
            "round {} opened on {} at {}ms, deadline {}ms",
            round.round_number, cell.id, now, due_at
        );

        Some((grid.with_cell_updated(cell), round))
    }

    /// Arm the pause before the next round.
    pub fn schedule_next(&mut self, now: u64, round_interval_ms: u64) {
        self.suspended = None;
        self.arm(TimerKind::NextRound, now.saturating_add(round_interval_ms));
    }

    /// Take the armed timer if it is due at `now`.
    pub fn poll(&mut self, now: u64) -> Option<Timer> {
        match self.armed {
            Some(timer) if timer.due_at <= now && timer.token.generation == self.generation => {
                self.armed = None;
                Some(timer)
            }
            _ => None,
        }
    }

    /// Whether a fired `NextRound` timer still belongs to this scheduler
    pub fn is_current(&self, timer: &Timer) -> bool {
        timer.token.generation == self.generation
    }

    /// Compare-and-clear on the open round. `deadline` restricts the take to
    /// the round armed with that token.
    fn take_open_round(&mut self, deadline: Option<TimerToken>) -> Option<Round> {
        match (self.open, deadline) {
            (Some(open), Some(token)) if open.deadline != token => None,
            (Some(open), _) => {
                self.open = None;
                if self.armed.is_some_and(|t| t.token == open.deadline) {
                    self.armed = None;
                }
                self.suspended = None;
                Some(open.round)
            }
            (None, _) => None,
        }
    }

    /// Player path: resolve the open round as a success if `cell_id` is its cell.
    pub fn resolve_click(&mut self, grid: &Grid, cell_id: CellId, now: u64) -> Option<Resolution> {
        match self.open {
            Some(open) if open.round.cell.id == cell_id => {}
            Some(_) => {
                debug!("click on {} ignored: not the active cell", cell_id);
                return None;
            }
            None => {
                debug!("click on {} ignored: no open round", cell_id);
                return None;
            }
        }

        let round = self.take_open_round(None)?;
        let reaction_time_ms = now.saturating_sub(round.start_time);
        let cell = grid
            .cell(cell_id)
            .copied()
            .unwrap_or(round.cell)
            .succeeded(reaction_time_ms);

        Some(Resolution {
            round: Round {
                end_time: Some(now),
                reaction_time_ms: Some(reaction_time_ms),
                result: Some(RoundResult::Success),
                ..round
            },
            cell,
            grid: grid.with_cell_updated(cell),
        })
    }

    /// Deadline path: resolve the open round as a timeout if `timer` is its deadline.
    pub fn resolve_timeout(&mut self, grid: &Grid, timer: &Timer, now: u64) -> Option<Resolution> {
        if timer.kind != TimerKind::Deadline {
            return None;
        }
        let Some(round) = self.take_open_round(Some(timer.token)) else {
            debug!("stale deadline at {}ms discarded", now);
            return None;
        };

        let cell = grid
            .cell(round.cell.id)
            .copied()
            .unwrap_or(round.cell)
            .failed();

        Some(Resolution {
            round: Round {
                end_time: Some(now),
                result: Some(RoundResult::Timeout),
                ..round
            },
            cell,
            grid: grid.with_cell_updated(cell),
        })
    }

    /// Hold the armed timer, remembering how much of it was left.
    pub fn suspend(&mut self, now: u64) {
        if let Some(timer) = self.armed.take() {
            self.suspended = Some(Suspended {
                kind: timer.kind,
                remaining_ms: timer.due_at.saturating_sub(now),
                paused_at: now,
            });
        }
    }

    /// Re-arm a held timer with its remaining time. An open round's start time
    /// moves forward by the paused duration so the pause is not counted as
    /// reaction time.
    pub fn resume(&mut self, now: u64) {
        let Some(held) = self.suspended.take() else {
            return;
        };

        let due_at = now.saturating_add(held.remaining_ms);
        let paused_for = now.saturating_sub(held.paused_at);

        match held.kind {
            TimerKind::Deadline => {
                let Some(mut open) = self.open else {
                    return;
                };
                open.round.start_time = open.round.start_time.saturating_add(paused_for);
                open.deadline = self.arm(TimerKind::Deadline, due_at);
                self.open = Some(open);
            }
            TimerKind::NextRound => {
                self.arm(TimerKind::NextRound, due_at);
            }
        }
    }
}
