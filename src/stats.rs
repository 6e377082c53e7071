use serde::{Deserialize, Serialize};

/// Running statistics for one session
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub player_score: u32,
    pub computer_score: u32,
    pub total_rounds: u32,
    /// Mean reaction time over successful rounds only
    pub average_reaction_time: f64,
    /// Fastest successful reaction; `None` until the player wins a round
    pub best_reaction_time: Option<u64>,
    pub missed_rounds: u32,
    pub accuracy: f64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leader(&self) -> Option<Side> {
        match self.player_score.cmp(&self.computer_score) {
            std::cmp::Ordering::Greater => Some(Side::Player),
            std::cmp::Ordering::Less => Some(Side::Computer),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Player,
    Computer,
}

/// Percentage of rounds won by the player; 0 when no round has been played
pub fn accuracy(player_score: u32, total_rounds: u32) -> f64 {
    if total_rounds == 0 {
        0.0
    } else {
        player_score as f64 / total_rounds as f64 * 100.0
    }
}

/// Fold a player win with the given reaction time into `stats`.
pub fn apply_player_win(stats: &Stats, reaction_time_ms: u64) -> Stats {
    let prev_count = stats.player_score;
    let player_score = prev_count + 1;
    let total_rounds = stats.total_rounds + 1;

    let average_reaction_time = (stats.average_reaction_time * prev_count as f64
        + reaction_time_ms as f64)
        / player_score as f64;

    let best_reaction_time = Some(match stats.best_reaction_time {
        Some(best) => best.min(reaction_time_ms),
        None => reaction_time_ms,
    });

    Stats {
        player_score,
        total_rounds,
        average_reaction_time,
        best_reaction_time,
        accuracy: accuracy(player_score, total_rounds),
        ..*stats
    }
}

/// Fold a timed-out round into `stats`. Reaction time figures are untouched.
pub fn apply_computer_win(stats: &Stats) -> Stats {
    let total_rounds = stats.total_rounds + 1;

    Stats {
        computer_score: stats.computer_score + 1,
        total_rounds,
        missed_rounds: stats.missed_rounds + 1,
        accuracy: accuracy(stats.player_score, total_rounds),
        ..*stats
    }
}
