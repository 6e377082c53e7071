use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, MouseEvent};

/// Terminal input consumed by the app runner
#[derive(Clone, Debug)]
pub enum GameInput {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize,
    /// Nothing arrived within one tick interval
    Tick,
}

/// Source of terminal input (keyboard, mouse, resize)
pub trait InputSource: Send + 'static {
    /// Block for up to `timeout` waiting for input.
    fn recv_timeout(&self, timeout: Duration) -> Result<GameInput, RecvTimeoutError>;
}

/// Production input source reading crossterm events on a background thread
pub struct CrosstermInputSource {
    rx: Receiver<GameInput>,
}

impl CrosstermInputSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let input = match event::read() {
                Ok(CtEvent::Key(key)) => GameInput::Key(key),
                Ok(CtEvent::Mouse(mouse)) => GameInput::Mouse(mouse),
                Ok(CtEvent::Resize(_, _)) => GameInput::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(input).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for CrosstermInputSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameInput, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Input source fed from a channel, for tests
pub struct TestInputSource {
    rx: Receiver<GameInput>,
}

impl TestInputSource {
    pub fn new(rx: Receiver<GameInput>) -> Self {
        Self { rx }
    }
}

impl InputSource for TestInputSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameInput, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Advances the application one input or tick at a time. The tick interval
/// bounds how late a round deadline can be noticed.
pub struct Runner<E: InputSource, T: Ticker> {
    input_source: E,
    ticker: T,
}

impl<E: InputSource, T: Ticker> Runner<E, T> {
    pub fn new(input_source: E, ticker: T) -> Self {
        Self {
            input_source,
            ticker,
        }
    }

    /// Blocks up to one tick interval; yields `Tick` when nothing arrived.
    pub fn step(&self) -> GameInput {
        match self.input_source.recv_timeout(self.ticker.interval()) {
            Ok(input) => input,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => GameInput::Tick,
        }
    }
}
