use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::{GameError, Result};

pub const MIN_RECOMMENDED_GRID_SIZE: usize = 5;
pub const MAX_RECOMMENDED_GRID_SIZE: usize = 15;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    /// `(reaction_time_ms, round_interval_ms)` for this preset
    pub fn timings(self) -> (u64, u64) {
        match self {
            Difficulty::Easy => (1200, 3000),
            Difficulty::Medium => (800, 2500),
            Difficulty::Hard => (600, 2000),
            Difficulty::Expert => (400, 1500),
        }
    }

    /// Weight applied to reaction times when rating efficiency
    pub fn multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 0.5,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 1.5,
            Difficulty::Expert => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameConfig {
    pub grid_size: usize,
    /// Deadline for the active round
    pub reaction_time_ms: u64,
    /// Delay between a resolution and the next activation
    pub round_interval_ms: u64,
    /// Score that ends the game
    pub max_score: u32,
    pub difficulty: Difficulty,
}

impl Default for GameConfig {
    fn default() -> Self {
        let (reaction_time_ms, round_interval_ms) = Difficulty::Medium.timings();
        Self {
            grid_size: 10,
            reaction_time_ms,
            round_interval_ms,
            max_score: 10,
            difficulty: Difficulty::Medium,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<()> {
        if self.grid_size == 0 {
            return Err(GameError::invalid_config(
                "grid_size",
                "must be a positive integer",
            ));
        }
        if self.reaction_time_ms == 0 {
            return Err(GameError::invalid_config(
                "reaction_time_ms",
                "must be greater than zero",
            ));
        }
        if self.max_score == 0 {
            return Err(GameError::invalid_config(
                "max_score",
                "must be greater than zero",
            ));
        }

        // Every round consumes a cell, and a game lasts at most 2·max_score − 1 rounds.
        let cells = self.grid_size.saturating_mul(self.grid_size);
        let rounds_needed = (self.max_score as usize).saturating_mul(2) - 1;
        if rounds_needed > cells {
            return Err(GameError::invalid_config(
                "max_score",
                format!(
                    "{} needs up to {} rounds but a {}x{} grid only has {} cells",
                    self.max_score, rounds_needed, self.grid_size, self.grid_size, cells
                ),
            ));
        }

        if !(MIN_RECOMMENDED_GRID_SIZE..=MAX_RECOMMENDED_GRID_SIZE).contains(&self.grid_size) {
            warn!(
                "grid size {} is outside the recommended range {}..={}",
                self.grid_size, MIN_RECOMMENDED_GRID_SIZE, MAX_RECOMMENDED_GRID_SIZE
            );
        }

        Ok(())
    }
}

/// Partial config: every `Some` field replaces the base value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub grid_size: Option<usize>,
    pub reaction_time_ms: Option<u64>,
    pub round_interval_ms: Option<u64>,
    pub max_score: Option<u32>,
    pub difficulty: Option<Difficulty>,
}

impl ConfigOverrides {
    pub fn difficulty(difficulty: Difficulty) -> Self {
        Self {
            difficulty: Some(difficulty),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge onto `base`. A difficulty brings its preset timings, which explicit
    /// timing overrides then replace.
    pub fn apply(&self, base: &GameConfig) -> GameConfig {
        let mut merged = *base;

        if let Some(difficulty) = self.difficulty {
            let (reaction, interval) = difficulty.timings();
            merged.difficulty = difficulty;
            merged.reaction_time_ms = reaction;
            merged.round_interval_ms = interval;
        }
        if let Some(grid_size) = self.grid_size {
            merged.grid_size = grid_size;
        }
        if let Some(reaction) = self.reaction_time_ms {
            merged.reaction_time_ms = reaction;
        }
        if let Some(interval) = self.round_interval_ms {
            merged.round_interval_ms = interval;
        }
        if let Some(max_score) = self.max_score {
            merged.max_score = max_score;
        }

        merged
    }
}

impl From<GameConfig> for ConfigOverrides {
    fn from(config: GameConfig) -> Self {
        Self {
            grid_size: Some(config.grid_size),
            reaction_time_ms: Some(config.reaction_time_ms),
            round_interval_ms: Some(config.round_interval_ms),
            max_score: Some(config.max_score),
            difficulty: Some(config.difficulty),
        }
    }
}

/// Settings remembered between runs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub game: GameConfig,
    pub muted: bool,
}

pub trait ConfigStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path =
            AppDirs::config_path().unwrap_or_else(|| PathBuf::from("reflex_grid_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Settings {
        let Ok(bytes) = fs::read(&self.path) else {
            return Settings::default();
        };

        match serde_json::from_slice::<Settings>(&bytes) {
            Ok(settings) if settings.game.validate().is_ok() => settings,
            Ok(_) => {
                warn!(
                    "stored config at {} is invalid, using defaults",
                    self.path.display()
                );
                Settings::default()
            }
            Err(e) => {
                warn!("could not parse {}: {}", self.path.display(), e);
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_medium() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.grid_size, 10);
        assert_eq!(cfg.reaction_time_ms, 800);
        assert_eq!(cfg.round_interval_ms, 2500);
        assert_eq!(cfg.max_score, 10);
        assert_eq!(cfg.difficulty, Difficulty::Medium);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn difficulty_presets() {
        assert_eq!(Difficulty::Easy.timings(), (1200, 3000));
        assert_eq!(Difficulty::Hard.timings(), (600, 2000));
        assert_eq!(Difficulty::Expert.timings(), (400, 1500));
        assert_eq!(Difficulty::Expert.to_string(), "expert");
    }

    #[test]
    fn overrides_apply_preset_then_explicit_timings() {
        let base = GameConfig::default();
        let merged = ConfigOverrides {
            difficulty: Some(Difficulty::Expert),
            round_interval_ms: Some(100),
            ..Default::default()
        }
        .apply(&base);

        assert_eq!(merged.difficulty, Difficulty::Expert);
        assert_eq!(merged.reaction_time_ms, 400);
        assert_eq!(merged.round_interval_ms, 100);
        assert_eq!(merged.grid_size, base.grid_size);
    }

    #[test]
    fn empty_overrides_keep_base() {
        let base = GameConfig {
            grid_size: 7,
            ..GameConfig::default()
        };
        let overrides = ConfigOverrides::default();
        assert!(overrides.is_empty());
        assert_eq!(overrides.apply(&base), base);
    }

    #[test]
    fn rejects_zero_values() {
        for cfg in [
            GameConfig {
                grid_size: 0,
                ..GameConfig::default()
            },
            GameConfig {
                reaction_time_ms: 0,
                ..GameConfig::default()
            },
            GameConfig {
                max_score: 0,
                ..GameConfig::default()
            },
        ] {
            assert!(matches!(
                cfg.validate(),
                Err(GameError::InvalidConfig { .. })
            ));
        }
    }

    #[test]
    fn rejects_grid_too_small_for_max_score() {
        let cfg = GameConfig {
            grid_size: 2,
            max_score: 3,
            ..GameConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(GameError::InvalidConfig {
                field: "max_score",
                ..
            })
        ));

        // 2x2 holds the three rounds a first-to-2 game can take
        let cfg = GameConfig {
            grid_size: 2,
            max_score: 2,
            ..GameConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_interval_is_allowed() {
        let cfg = GameConfig {
            round_interval_ms: 0,
            ..GameConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn roundtrip_default_settings() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let settings = Settings::default();
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn save_and_load_custom_settings() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nested").join("config.json"));
        let settings = Settings {
            game: GameConfig {
                grid_size: 6,
                reaction_time_ms: 450,
                round_interval_ms: 900,
                max_score: 5,
                difficulty: Difficulty::Hard,
            },
            muted: true,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn missing_or_corrupt_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Settings::default());

        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn invalid_stored_config_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut settings = Settings::default();
        settings.game.grid_size = 0;
        fs::write(&path, serde_json::to_vec(&settings).unwrap()).unwrap();

        assert_eq!(FileConfigStore::with_path(&path).load(), Settings::default());
    }
}
