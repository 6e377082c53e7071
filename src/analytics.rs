//! Performance metrics over recorded sessions, plus JSON/CSV export and JSON import.

use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::config::Difficulty;
use crate::error::{GameError, Result};
use crate::scheduler::RoundResult;
use crate::session::{GameResult, SessionRecord};
use crate::util::{mean, slope, std_dev};

/// Sessions considered when computing the improvement trend
pub const TREND_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub average_reaction_time: f64,
    /// 0-100, higher means less spread between reaction times
    pub consistency_score: f64,
    /// Positive when reaction times are falling across recent sessions
    pub improvement_trend: f64,
    /// Player wins at the end of the history, uninterrupted
    pub streak_length: u32,
    pub efficiency_rating: f64,
}

/// Positive reaction times of the successful rounds of `record`
pub fn session_reaction_times(record: &SessionRecord) -> Vec<f64> {
    record
        .rounds
        .iter()
        .filter(|r| r.result == Some(RoundResult::Success))
        .filter_map(|r| r.reaction_time_ms)
        .filter(|&ms| ms > 0)
        .map(|ms| ms as f64)
        .collect_vec()
}

pub fn reaction_times(records: &[SessionRecord]) -> Vec<f64> {
    records.iter().flat_map(session_reaction_times).collect_vec()
}

pub fn performance_metrics(records: &[SessionRecord]) -> PerformanceMetrics {
    if records.is_empty() {
        return PerformanceMetrics::default();
    }

    let times = reaction_times(records);
    PerformanceMetrics {
        average_reaction_time: mean(&times).unwrap_or(0.0),
        consistency_score: consistency(&times),
        improvement_trend: improvement_trend(records),
        streak_length: streak_length(records),
        efficiency_rating: efficiency_rating(records),
    }
}

/// Metrics per difficulty, for every difficulty that has at least one session
pub fn metrics_by_difficulty(records: &[SessionRecord]) -> Vec<(Difficulty, PerformanceMetrics)> {
    let groups = records.iter().into_group_map_by(|r| r.difficulty);

    Difficulty::ALL
        .iter()
        .filter_map(|difficulty| {
            let group = groups.get(difficulty)?;
            let owned = group.iter().map(|r| (*r).clone()).collect_vec();
            Some((*difficulty, performance_metrics(&owned)))
        })
        .collect()
}

fn consistency(times: &[f64]) -> f64 {
    if times.len() < 2 {
        return 100.0;
    }
    let (Some(avg), Some(sigma)) = (mean(times), std_dev(times)) else {
        return 100.0;
    };
    let max_expected = avg * 0.5;
    if max_expected <= 0.0 {
        return 100.0;
    }
    (100.0 - sigma / max_expected * 100.0).clamp(0.0, 100.0)
}

fn improvement_trend(records: &[SessionRecord]) -> f64 {
    if records.len() < 2 {
        return 0.0;
    }

    let recent = &records[records.len().saturating_sub(TREND_WINDOW)..];
    let averages = recent
        .iter()
        .filter_map(|r| mean(&session_reaction_times(r)))
        .filter(|avg| *avg > 0.0)
        .collect_vec();

    // falling reaction times are an improvement
    slope(&averages).map(|s| -s).unwrap_or(0.0)
}

fn streak_length(records: &[SessionRecord]) -> u32 {
    records
        .iter()
        .rev()
        .take_while(|r| r.result == GameResult::PlayerWin)
        .count() as u32
}

fn efficiency_rating(records: &[SessionRecord]) -> f64 {
    let ratings = records
        .iter()
        .map(|r| {
            let avg = mean(&session_reaction_times(r)).unwrap_or(0.0);
            let time_bonus = (100.0 - avg * r.difficulty.multiplier() / 10.0).max(0.0);
            (r.final_stats.accuracy + time_bonus) / 2.0
        })
        .collect_vec();
    mean(&ratings).unwrap_or(0.0)
}

pub fn export_json<W: Write>(records: &[SessionRecord], writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, records)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct CsvRow {
    id: String,
    started_at: String,
    ended_at: String,
    difficulty: String,
    result: String,
    player_score: u32,
    computer_score: u32,
    total_rounds: u32,
    average_reaction_time: String,
    best_reaction_time: String,
    missed_rounds: u32,
    accuracy: String,
}

impl From<&SessionRecord> for CsvRow {
    fn from(r: &SessionRecord) -> Self {
        let s = &r.final_stats;
        Self {
            id: r.id.to_string(),
            started_at: r.started_at.to_rfc3339(),
            ended_at: r.ended_at.map_or(String::new(), |t| t.to_rfc3339()),
            difficulty: r.difficulty.to_string(),
            result: r.result.to_string(),
            player_score: s.player_score,
            computer_score: s.computer_score,
            total_rounds: s.total_rounds,
            average_reaction_time: format!("{:.2}", s.average_reaction_time),
            best_reaction_time: s
                .best_reaction_time
                .map_or(String::new(), |ms| ms.to_string()),
            missed_rounds: s.missed_rounds,
            accuracy: format!("{:.2}", s.accuracy),
        }
    }
}

/// One row per session; rounds are left out.
pub fn export_csv<W: Write>(records: &[SessionRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(CsvRow::from(record))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse and validate exported sessions. Nothing is returned unless every
/// record is valid.
pub fn import_json<R: Read>(reader: R) -> Result<Vec<SessionRecord>> {
    let records: Vec<SessionRecord> = serde_json::from_reader(reader)?;
    validate_records(&records)?;
    Ok(records)
}

pub fn validate_records(records: &[SessionRecord]) -> Result<()> {
    for (idx, record) in records.iter().enumerate() {
        if let Err(reason) = validate_record(record) {
            warn!("rejecting imported session #{idx}: {reason}");
            return Err(GameError::InvalidSessionData(format!(
                "session #{idx} ({}): {reason}",
                record.id
            )));
        }
    }
    Ok(())
}

fn validate_record(record: &SessionRecord) -> std::result::Result<(), String> {
    if record.id.is_nil() {
        return Err("missing id".into());
    }

    let stats = &record.final_stats;
    if stats.player_score + stats.computer_score != stats.total_rounds {
        return Err(format!(
            "scores {}-{} do not add up to {} rounds",
            stats.player_score, stats.computer_score, stats.total_rounds
        ));
    }

    let consistent = match record.result {
        GameResult::PlayerWin => stats.player_score > stats.computer_score,
        GameResult::ComputerWin => stats.computer_score > stats.player_score,
    };
    if !consistent {
        return Err(format!(
            "result {} contradicts score {}-{}",
            record.result, stats.player_score, stats.computer_score
        ));
    }

    if let Some(ended_at) = record.ended_at {
        if ended_at < record.started_at {
            return Err("ends before it starts".into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, CellId};
    use crate::scheduler::Round;
    use crate::stats::{apply_computer_win, apply_player_win, Stats};
    use chrono::{Duration, Local};
    use uuid::Uuid;

    /// Build a finished session from per-round outcomes (`Some(ms)` is a hit).
    fn session(difficulty: Difficulty, outcomes: &[Option<u64>]) -> SessionRecord {
        let mut stats = Stats::new();
        let mut rounds = Vec::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            let start = i as u64 * 1000;
            stats = match outcome {
                Some(ms) => apply_player_win(&stats, *ms),
                None => apply_computer_win(&stats),
            };
            rounds.push(Round {
                round_number: i as u32 + 1,
                cell: Cell::idle(CellId::new(0, i)).activated(start),
                start_time: start,
                end_time: Some(start + outcome.unwrap_or(500)),
                reaction_time_ms: *outcome,
                result: Some(match outcome {
                    Some(_) => RoundResult::Success,
                    None => RoundResult::Timeout,
                }),
            });
        }
        let started_at = Local::now();
        SessionRecord {
            id: Uuid::new_v4(),
            started_at,
            ended_at: Some(started_at + Duration::seconds(20)),
            difficulty,
            final_stats: stats,
            result: if stats.player_score > stats.computer_score {
                GameResult::PlayerWin
            } else {
                GameResult::ComputerWin
            },
            rounds,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn empty_history_is_all_zero() {
        assert_eq!(performance_metrics(&[]), PerformanceMetrics::default());
    }

    #[test]
    fn averages_only_successful_rounds() {
        let records = vec![session(Difficulty::Medium, &[Some(200), None, Some(400)])];
        let m = performance_metrics(&records);
        assert!(approx(m.average_reaction_time, 300.0));
    }

    #[test]
    fn consistency_is_full_with_few_samples_or_no_spread() {
        let one = vec![session(Difficulty::Medium, &[Some(250), None, None])];
        assert!(approx(performance_metrics(&one).consistency_score, 100.0));

        let flat = vec![session(Difficulty::Medium, &[Some(300), Some(300)])];
        assert!(approx(performance_metrics(&flat).consistency_score, 100.0));
    }

    #[test]
    fn consistency_drops_with_spread() {
        // mean 300, sigma 100 → 100 - 100/150·100
        let records = vec![session(Difficulty::Medium, &[Some(200), Some(400)])];
        let m = performance_metrics(&records);
        assert!(approx(m.consistency_score, 100.0 - 100.0 / 150.0 * 100.0));

        let wild = vec![session(Difficulty::Medium, &[Some(10), Some(2000)])];
        assert!(approx(performance_metrics(&wild).consistency_score, 0.0));
    }

    #[test]
    fn trend_is_positive_when_getting_faster() {
        let records = vec![
            session(Difficulty::Medium, &[Some(600), Some(600)]),
            session(Difficulty::Medium, &[Some(500), Some(500)]),
            session(Difficulty::Medium, &[Some(400), Some(400)]),
        ];
        assert!(approx(performance_metrics(&records).improvement_trend, 100.0));
    }

    #[test]
    fn trend_needs_two_sessions_with_hits() {
        let records = vec![
            session(Difficulty::Medium, &[Some(600), Some(600)]),
            session(Difficulty::Medium, &[None, None]),
        ];
        assert_eq!(performance_metrics(&records).improvement_trend, 0.0);
    }

    #[test]
    fn trend_only_looks_at_recent_sessions() {
        let mut records = vec![session(Difficulty::Medium, &[Some(5000), Some(5000)])];
        for _ in 0..TREND_WINDOW {
            records.push(session(Difficulty::Medium, &[Some(300), Some(300)]));
        }
        assert!(approx(performance_metrics(&records).improvement_trend, 0.0));
    }

    #[test]
    fn streak_counts_trailing_wins() {
        let win = || session(Difficulty::Easy, &[Some(300), Some(300)]);
        let loss = || session(Difficulty::Easy, &[None, None]);
        let records = vec![win(), loss(), win(), win()];
        assert_eq!(performance_metrics(&records).streak_length, 2);

        let records = vec![win(), loss()];
        assert_eq!(performance_metrics(&records).streak_length, 0);
    }

    #[test]
    fn efficiency_weights_reaction_time_by_difficulty() {
        // accuracy 100, avg 400: medium bonus 60, expert bonus 20
        let medium = vec![session(Difficulty::Medium, &[Some(400), Some(400)])];
        let expert = vec![session(Difficulty::Expert, &[Some(400), Some(400)])];
        assert!(approx(performance_metrics(&medium).efficiency_rating, 80.0));
        assert!(approx(performance_metrics(&expert).efficiency_rating, 60.0));
    }

    #[test]
    fn groups_by_difficulty_in_preset_order() {
        let records = vec![
            session(Difficulty::Hard, &[Some(300), Some(300)]),
            session(Difficulty::Easy, &[Some(500), Some(500)]),
            session(Difficulty::Hard, &[Some(500), Some(500)]),
        ];
        let grouped = metrics_by_difficulty(&records);
        let difficulties = grouped.iter().map(|(d, _)| *d).collect_vec();
        assert_eq!(difficulties, vec![Difficulty::Easy, Difficulty::Hard]);
        assert!(approx(grouped[1].1.average_reaction_time, 400.0));
    }

    #[test]
    fn json_export_imports_back() {
        let records = vec![
            session(Difficulty::Medium, &[Some(300), None, Some(280)]),
            session(Difficulty::Hard, &[None, None]),
        ];
        let mut buf = Vec::new();
        export_json(&records, &mut buf).unwrap();

        let imported = import_json(buf.as_slice()).unwrap();
        assert_eq!(imported.len(), 2);
        assert_eq!(imported[0].id, records[0].id);
        assert_eq!(imported[1].rounds, records[1].rounds);
    }

    #[test]
    fn import_rejects_inconsistent_sessions() {
        let mut bad = session(Difficulty::Medium, &[Some(300), Some(300)]);
        bad.result = GameResult::ComputerWin;
        let mut buf = Vec::new();
        export_json(&[bad], &mut buf).unwrap();

        assert!(matches!(
            import_json(buf.as_slice()),
            Err(GameError::InvalidSessionData(_))
        ));
    }

    #[test]
    fn import_rejects_nil_id_and_garbage() {
        let mut bad = session(Difficulty::Medium, &[Some(300)]);
        bad.id = Uuid::nil();
        assert!(validate_records(&[bad]).is_err());

        assert!(matches!(
            import_json(&b"[{\"id\": 3}]"[..]),
            Err(GameError::Serialization(_))
        ));
    }

    #[test]
    fn csv_has_header_and_one_row_per_session() {
        let records = vec![
            session(Difficulty::Medium, &[Some(300), Some(320)]),
            session(Difficulty::Expert, &[None, None]),
        ];
        let mut buf = Vec::new();
        export_csv(&records, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines = text.lines().collect_vec();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,started_at,ended_at,difficulty,result"));
        assert!(lines[1].contains(",medium,player_win,"));
        assert!(lines[2].contains(",expert,computer_win,"));
    }
}
