use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "reflex-grid";

/// Where the game keeps its files between runs
pub struct AppDirs;

impl AppDirs {
    /// Session history database, under `$HOME/.local/state/reflex-grid` when
    /// `HOME` is set
    pub fn history_db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME);
            Some(state_dir.join("history.db"))
        } else {
            ProjectDirs::from("", "", APP_NAME)
                .map(|proj_dirs| proj_dirs.data_local_dir().join("history.db"))
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|pd| pd.config_dir().join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_namespaced_by_app() {
        if let Some(path) = AppDirs::history_db_path() {
            assert!(path.ends_with("history.db"));
            assert!(path.to_string_lossy().contains(APP_NAME));
        }
        if let Some(path) = AppDirs::config_path() {
            assert!(path.ends_with("config.json"));
        }
    }
}
