use thiserror::Error;

/// Errors surfaced by the game core and its collaborators.
///
/// Commands issued in a state that forbids them and resolutions that arrive for
/// a round that is no longer open are not errors: the session absorbs them.
#[derive(Debug, Error)]
pub enum GameError {
    /// A configuration value failed validation.
    #[error("invalid config: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    #[error("history storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Imported session data did not pass validation.
    #[error("invalid session data: {0}")]
    InvalidSessionData(String),
}

impl GameError {
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        GameError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GameError>;
