//! Session history stored in SQLite.

use chrono::{DateTime, Local};
use log::{debug, info};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::app_dirs::AppDirs;
use crate::config::Difficulty;
use crate::error::Result;
use crate::grid::{Cell, CellId};
use crate::scheduler::{Round, RoundResult};
use crate::session::{GameResult, SessionRecord};
use crate::stats::Stats;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        started_at TEXT NOT NULL,
        ended_at TEXT,
        difficulty TEXT NOT NULL,
        result TEXT NOT NULL,
        player_score INTEGER NOT NULL,
        computer_score INTEGER NOT NULL,
        total_rounds INTEGER NOT NULL,
        average_reaction_time REAL NOT NULL,
        best_reaction_time INTEGER,
        missed_rounds INTEGER NOT NULL,
        accuracy REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS rounds (
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        round_number INTEGER NOT NULL,
        cell_row INTEGER NOT NULL,
        cell_col INTEGER NOT NULL,
        activated_at INTEGER,
        start_time INTEGER NOT NULL,
        end_time INTEGER,
        reaction_time_ms INTEGER,
        result TEXT,
        PRIMARY KEY (session_id, round_number)
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at);
    CREATE INDEX IF NOT EXISTS idx_sessions_difficulty ON sessions(difficulty);
"#;

const SELECT_SESSIONS: &str = r#"
    SELECT id, started_at, ended_at, difficulty, result,
           player_score, computer_score, total_rounds, average_reaction_time,
           best_reaction_time, missed_rounds, accuracy
    FROM sessions
"#;

/// Finished games, one row per session plus its rounds
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!("opening history at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// History under the platform state directory
    pub fn open_default() -> Result<Self> {
        let path =
            AppDirs::history_db_path().unwrap_or_else(|| PathBuf::from("reflex_grid_history.db"));
        Self::open(path)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Store a finished session. Recording the same id again replaces it.
    pub fn record_session(&mut self, record: &SessionRecord) -> Result<()> {
        let tx = self.conn.transaction()?;
        let id = record.id.to_string();
        let stats = &record.final_stats;

        tx.execute("DELETE FROM rounds WHERE session_id = ?1", [&id])?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO sessions
            (id, started_at, ended_at, difficulty, result,
             player_score, computer_score, total_rounds, average_reaction_time,
             best_reaction_time, missed_rounds, accuracy)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                id,
                record.started_at.to_rfc3339(),
                record.ended_at.map(|t| t.to_rfc3339()),
                record.difficulty.to_string(),
                record.result.to_string(),
                stats.player_score,
                stats.computer_score,
                stats.total_rounds,
                stats.average_reaction_time,
                stats.best_reaction_time,
                stats.missed_rounds,
                stats.accuracy,
            ],
        )?;

        for round in &record.rounds {
            tx.execute(
                r#"
                INSERT INTO rounds
                (session_id, round_number, cell_row, cell_col, activated_at,
                 start_time, end_time, reaction_time_ms, result)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    id,
                    round.round_number,
                    round.cell.id.row,
                    round.cell.id.col,
                    round.cell.activated_at,
                    round.start_time,
                    round.end_time,
                    round.reaction_time_ms,
                    round.result.map(|r| r.to_string()),
                ],
            )?;
        }

        tx.commit()?;
        info!(
            "recorded session {} ({} rounds)",
            record.id,
            record.rounds.len()
        );
        Ok(())
    }

    /// Every stored session, oldest first
    pub fn sessions(&self) -> Result<Vec<SessionRecord>> {
        let sql = format!("{SELECT_SESSIONS} ORDER BY started_at ASC, rowid ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], session_from_row)?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        self.attach_rounds(records)
    }

    pub fn sessions_by_difficulty(&self, difficulty: Difficulty) -> Result<Vec<SessionRecord>> {
        let sql =
            format!("{SELECT_SESSIONS} WHERE difficulty = ?1 ORDER BY started_at ASC, rowid ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([difficulty.to_string()], session_from_row)?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        self.attach_rounds(records)
    }

    pub fn session_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn clear_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM rounds", [])?;
        tx.execute("DELETE FROM sessions", [])?;
        tx.commit()?;
        info!("history cleared");
        Ok(())
    }

    fn attach_rounds(&self, mut records: Vec<SessionRecord>) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT round_number, cell_row, cell_col, activated_at,
                   start_time, end_time, reaction_time_ms, result
            FROM rounds
            WHERE session_id = ?1
            ORDER BY round_number ASC
            "#,
        )?;

        for record in records.iter_mut() {
            let rows = stmt.query_map([record.id.to_string()], round_from_row)?;
            for round in rows {
                record.rounds.push(round?);
            }
        }
        Ok(records)
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let ended_at: Option<String> = row.get(2)?;

    Ok(SessionRecord {
        id,
        started_at: parse_timestamp(1, &row.get::<_, String>(1)?)?,
        ended_at: ended_at.map(|t| parse_timestamp(2, &t)).transpose()?,
        difficulty: parse_tag::<Difficulty>(3, row.get(3)?)?,
        result: parse_tag::<GameResult>(4, row.get(4)?)?,
        final_stats: Stats {
            player_score: row.get(5)?,
            computer_score: row.get(6)?,
            total_rounds: row.get(7)?,
            average_reaction_time: row.get(8)?,
            best_reaction_time: row.get(9)?,
            missed_rounds: row.get(10)?,
            accuracy: row.get(11)?,
        },
        rounds: Vec::new(),
    })
}

fn round_from_row(row: &Row<'_>) -> rusqlite::Result<Round> {
    let id = CellId::new(row.get(1)?, row.get(2)?);
    let activated_at: Option<u64> = row.get(3)?;
    let mut cell = Cell::idle(id);
    if let Some(at) = activated_at {
        cell = cell.activated(at);
    }

    let result: Option<String> = row.get(7)?;
    Ok(Round {
        round_number: row.get(0)?,
        cell,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        reaction_time_ms: row.get(6)?,
        result: result.map(|r| parse_tag::<RoundResult>(7, r)).transpose()?,
    })
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Local))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decode a snake_case enum tag written with its `Display` impl.
fn parse_tag<T: DeserializeOwned>(idx: usize, value: String) -> rusqlite::Result<T> {
    serde_json::from_value(serde_json::Value::String(value))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
