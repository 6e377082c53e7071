// Library surface for the game core, headless/integration tests and the
// terminal front end in main.rs.
pub mod analytics;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod feedback;
pub mod grid;
pub mod history;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod util;

pub use error::{GameError, Result};
pub use session::{GameSession, Snapshot};
