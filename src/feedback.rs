use serde::{Deserialize, Serialize};

use crate::events::GameEvent;
use crate::session::GameResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SoundEffect {
    GameStart,
    CellActivate,
    Success,
    Lightning,
    Miss,
    GameWin,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReactionSpeed {
    Lightning,
    Fast,
    Good,
    Slow,
}

impl ReactionSpeed {
    pub fn classify(reaction_time_ms: u64) -> Self {
        match reaction_time_ms {
            0..=299 => ReactionSpeed::Lightning,
            300..=499 => ReactionSpeed::Fast,
            500..=699 => ReactionSpeed::Good,
            _ => ReactionSpeed::Slow,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ReactionSpeed::Lightning => "Lightning fast!",
            ReactionSpeed::Fast => "Great reaction!",
            ReactionSpeed::Good => "Nice job!",
            ReactionSpeed::Slow => "Keep trying!",
        }
    }
}

/// What the front end should play and show in response to an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// `None` when muted or the event has no sound
    pub sound: Option<SoundEffect>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Feedback {
    muted: bool,
}

impl Feedback {
    pub fn new(muted: bool) -> Self {
        Self { muted }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn on_event(&self, event: &GameEvent) -> Option<Cue> {
        let (sound, message) = match event {
            GameEvent::Started => (SoundEffect::GameStart, Some("Go!".to_string())),
            GameEvent::RoundStarted { .. } => (SoundEffect::CellActivate, None),
            GameEvent::PlayerSuccess {
                reaction_time_ms, ..
            } => {
                let speed = ReactionSpeed::classify(*reaction_time_ms);
                let sound = if speed == ReactionSpeed::Lightning {
                    SoundEffect::Lightning
                } else {
                    SoundEffect::Success
                };
                (
                    sound,
                    Some(format!("{} {}ms", speed.message(), reaction_time_ms)),
                )
            }
            GameEvent::ComputerWin { .. } => (SoundEffect::Miss, Some("Too slow!".to_string())),
            GameEvent::Finished { result, stats } => match result {
                GameResult::PlayerWin => (
                    SoundEffect::GameWin,
                    Some(format!(
                        "You win {} - {}!",
                        stats.player_score, stats.computer_score
                    )),
                ),
                GameResult::ComputerWin => (
                    SoundEffect::GameOver,
                    Some(format!(
                        "The computer wins {} - {}.",
                        stats.computer_score, stats.player_score
                    )),
                ),
            },
            _ => return None,
        };

        Some(Cue {
            sound: (!self.muted).then_some(sound),
            message,
        })
    }
}
