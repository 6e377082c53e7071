use reflex_grid::analytics;
use reflex_grid::clock::ManualClock;
use reflex_grid::config::{Difficulty, GameConfig};
use reflex_grid::history::HistoryDb;
use reflex_grid::session::{GameResult, GameSession, SessionRecord};
use tempfile::tempdir;

/// Play a full game on a manual clock: hit the first `hits` rounds after
/// `reaction_ms`, let the rest time out.
fn play(difficulty: Difficulty, hits: u32, reaction_ms: u64) -> SessionRecord {
    let clock = ManualClock::new();
    let config = GameConfig {
        grid_size: 5,
        reaction_time_ms: 1000,
        round_interval_ms: 20,
        max_score: 3,
        difficulty,
    };
    let mut session = GameSession::new(config, clock.clone()).unwrap();
    session.start();

    let mut round = 0;
    while session.session_record().is_none() {
        let cell = session.active_cell().expect("an open round").id;
        if round < hits {
            clock.advance(reaction_ms);
            session.handle_cell_click(cell);
        } else {
            clock.advance(1000);
            session.tick();
        }
        round += 1;
        clock.advance(20);
        session.tick();
    }

    session.session_record().unwrap()
}

#[test]
fn played_sessions_round_trip_through_the_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("history.db");

    let won = play(Difficulty::Easy, 3, 250);
    let lost = play(Difficulty::Hard, 1, 400);
    assert_eq!(won.result, GameResult::PlayerWin);
    assert_eq!(lost.result, GameResult::ComputerWin);

    {
        let mut db = HistoryDb::open(&path).unwrap();
        db.record_session(&won).unwrap();
        db.record_session(&lost).unwrap();
    }

    // reopen from disk
    let db = HistoryDb::open(&path).unwrap();
    assert_eq!(db.session_count().unwrap(), 2);

    let stored = db.sessions().unwrap();
    let stored_won = stored.iter().find(|r| r.id == won.id).unwrap();
    assert_eq!(stored_won.final_stats, won.final_stats);
    assert_eq!(stored_won.rounds, won.rounds);
    assert_eq!(stored_won.difficulty, Difficulty::Easy);

    let hard = db.sessions_by_difficulty(Difficulty::Hard).unwrap();
    assert_eq!(hard.len(), 1);
    assert_eq!(hard[0].result, GameResult::ComputerWin);
    assert_eq!(hard[0].final_stats.missed_rounds, 3);
}

#[test]
fn analytics_over_recorded_history() {
    let mut db = HistoryDb::open_in_memory().unwrap();
    for reaction in [400, 350, 300, 250] {
        db.record_session(&play(Difficulty::Medium, 3, reaction)).unwrap();
    }

    let records = db.sessions().unwrap();
    let metrics = analytics::performance_metrics(&records);
    assert!((metrics.average_reaction_time - 325.0).abs() < 1e-9);
    assert!(metrics.improvement_trend > 0.0);
    assert_eq!(metrics.streak_length, 4);
    assert!(metrics.consistency_score > 0.0);

    let by_difficulty = analytics::metrics_by_difficulty(&records);
    assert_eq!(by_difficulty.len(), 1);
    assert_eq!(by_difficulty[0].0, Difficulty::Medium);
}

#[test]
fn export_then_import_into_fresh_database() {
    let mut source = HistoryDb::open_in_memory().unwrap();
    source.record_session(&play(Difficulty::Easy, 3, 300)).unwrap();
    source.record_session(&play(Difficulty::Hard, 0, 0)).unwrap();
    let records = source.sessions().unwrap();

    let mut json = Vec::new();
    analytics::export_json(&records, &mut json).unwrap();
    let imported = analytics::import_json(json.as_slice()).unwrap();
    assert_eq!(imported, records);

    let mut target = HistoryDb::open_in_memory().unwrap();
    for record in &imported {
        target.record_session(record).unwrap();
    }
    assert_eq!(target.session_count().unwrap(), 2);

    let mut csv = Vec::new();
    analytics::export_csv(&records, &mut csv).unwrap();
    let text = String::from_utf8(csv).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("id,started_at"));
}

#[test]
fn tampered_import_is_rejected() {
    let mut record = play(Difficulty::Medium, 3, 300);
    record.final_stats.player_score = 1;

    let json = serde_json::to_vec(&[record]).unwrap();
    assert!(analytics::import_json(json.as_slice()).is_err());
}
