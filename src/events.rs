use std::sync::mpsc::{self, Receiver, Sender};

use crate::config::GameConfig;
use crate::grid::Cell;
use crate::session::GameResult;
use crate::stats::Stats;

/// Discrete notifications emitted by the session
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Initialized { config: GameConfig },
    Started,
    Paused,
    Resumed,
    Stopped,
    Reset,
    RoundStarted { round_number: u32, cell: Cell },
    PlayerSuccess { reaction_time_ms: u64, cell: Cell },
    ComputerWin { cell: Cell },
    Finished { result: GameResult, stats: Stats },
    ConfigUpdated { config: GameConfig },
}

impl GameEvent {
    /// Stable tag for the event, as consumed by logging and collaborators
    pub fn tag(&self) -> &'static str {
        match self {
            GameEvent::Initialized { .. } => "GAME_INITIALIZED",
            GameEvent::Started => "GAME_STARTED",
            GameEvent::Paused => "GAME_PAUSED",
            GameEvent::Resumed => "GAME_RESUMED",
            GameEvent::Stopped => "GAME_STOPPED",
            GameEvent::Reset => "GAME_RESET",
            GameEvent::RoundStarted { .. } => "ROUND_STARTED",
            GameEvent::PlayerSuccess { .. } => "PLAYER_SUCCESS",
            GameEvent::ComputerWin { .. } => "COMPUTER_WIN",
            GameEvent::Finished { .. } => "GAME_FINISHED",
            GameEvent::ConfigUpdated { .. } => "CONFIG_UPDATED",
        }
    }
}

/// Fan-out of values to any number of channel subscribers.
///
/// Subscribers that dropped their receiver are pruned on the next publish.
#[derive(Debug)]
pub struct Publisher<T: Clone> {
    subscribers: Vec<Sender<T>>,
}

impl<T: Clone> Publisher<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Subscribe and receive `initial` before anything published afterwards.
    pub fn subscribe_with(&mut self, initial: T) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        // the receiver is still in scope, so the send cannot fail
        let _ = tx.send(initial);
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, value: T) {
        self.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T: Clone> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_every_subscriber() {
        let mut publisher = Publisher::new();
        let a = publisher.subscribe();
        let b = publisher.subscribe();

        publisher.publish(7u32);

        assert_eq!(a.try_recv().unwrap(), 7);
        assert_eq!(b.try_recv().unwrap(), 7);
        assert!(a.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut publisher = Publisher::new();
        let keep = publisher.subscribe();
        drop(publisher.subscribe());
        assert_eq!(publisher.subscriber_count(), 2);

        publisher.publish(1u32);

        assert_eq!(publisher.subscriber_count(), 1);
        assert_eq!(keep.try_recv().unwrap(), 1);
    }

    #[test]
    fn late_subscribers_only_see_later_values() {
        let mut publisher = Publisher::new();
        publisher.publish("early");
        let rx = publisher.subscribe();
        publisher.publish("late");
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["late"]);
    }

    #[test]
    fn subscribe_with_delivers_initial_value_first() {
        let mut publisher = Publisher::new();
        publisher.publish(0u32);
        let rx = publisher.subscribe_with(1);
        publisher.publish(2);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn tags_match_event_names() {
        assert_eq!(GameEvent::Started.tag(), "GAME_STARTED");
        assert_eq!(GameEvent::Reset.tag(), "GAME_RESET");
        assert_eq!(
            GameEvent::ConfigUpdated {
                config: GameConfig::default()
            }
            .tag(),
            "CONFIG_UPDATED"
        );
    }
}
