use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget},
};
use std::time::Duration;
use time_humanize::{Accuracy, HumanTime, Tense};

use reflex_grid::{
    analytics::{metrics_by_difficulty, performance_metrics},
    clock::Clock,
    session::{GameResult, SessionRecord},
};

use crate::App;

/// Sessions shown on the history screen, newest first
pub const MAX_ROWS: usize = 20;

pub fn humanize_age(started_at: DateTime<Local>, now: DateTime<Local>) -> String {
    let secs = (now - started_at).num_seconds().max(0) as u64;
    HumanTime::from(Duration::from_secs(secs)).to_text_en(Accuracy::Rough, Tense::Past)
}

/// Pure presenter for a single history row
pub fn present_row(record: &SessionRecord, now: DateTime<Local>) -> Row<'static> {
    let stats = &record.final_stats;
    let (result, result_color) = match record.result {
        GameResult::PlayerWin => ("win", Color::Green),
        GameResult::ComputerWin => ("loss", Color::Red),
    };

    let avg_color = if stats.average_reaction_time == 0.0 {
        Color::Gray
    } else if stats.average_reaction_time < 300.0 {
        Color::Green
    } else if stats.average_reaction_time < 500.0 {
        Color::Yellow
    } else {
        Color::Red
    };

    Row::new(vec![
        Cell::from(humanize_age(record.started_at, now)),
        Cell::from(record.difficulty.to_string()),
        Cell::from(result).style(
            Style::default()
                .fg(result_color)
                .add_modifier(Modifier::BOLD),
        ),
        Cell::from(format!("{} - {}", stats.player_score, stats.computer_score)),
        Cell::from(format!("{:.0}", stats.average_reaction_time))
            .style(Style::default().fg(avg_color)),
        Cell::from(
            stats
                .best_reaction_time
                .map_or(String::from("—"), |ms| ms.to_string()),
        ),
        Cell::from(format!("{:.0}%", stats.accuracy)),
    ])
}

pub fn render_history<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    let overall = performance_metrics(&app.records);
    let by_difficulty = metrics_by_difficulty(&app.records)
        .into_iter()
        .map(|(d, m)| format!("{d} {:.0}ms", m.average_reaction_time))
        .collect::<Vec<_>>()
        .join("  ");

    Paragraph::new(vec![
        Line::from(format!(
            "{} sessions   avg {:.0}ms   consistency {:.0}   trend {:+.1}   streak {}   efficiency {:.0}",
            app.records.len(),
            overall.average_reaction_time,
            overall.consistency_score,
            overall.improvement_trend,
            overall.streak_length,
            overall.efficiency_rating,
        )),
        Line::from(by_difficulty),
    ])
    .alignment(Alignment::Center)
    .style(Style::default().add_modifier(Modifier::BOLD))
    .render(chunks[0], buf);

    if app.records.is_empty() {
        Paragraph::new("No games recorded yet.")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("History"))
            .render(chunks[1], buf);
    } else {
        let now = Local::now();
        let rows = app
            .records
            .iter()
            .rev()
            .take(MAX_ROWS)
            .map(|r| present_row(r, now))
            .collect::<Vec<_>>();

        let header = Row::new(vec![
            "played", "difficulty", "result", "score", "avg ms", "best ms", "accuracy",
        ])
        .style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .add_modifier(Modifier::UNDERLINED),
        );

        Table::new(
            rows,
            [
                Constraint::Length(18),
                Constraint::Length(10),
                Constraint::Length(7),
                Constraint::Length(7),
                Constraint::Length(7),
                Constraint::Length(8),
                Constraint::Length(9),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("History"))
        .render(chunks[1], buf);
    }

    Paragraph::new(Span::styled(
        "(h)/(b)ack / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[2], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use reflex_grid::{config::Difficulty, stats::Stats};
    use uuid::Uuid;

    fn record(result: GameResult) -> SessionRecord {
        let started_at = Local::now() - ChronoDuration::hours(2);
        SessionRecord {
            id: Uuid::new_v4(),
            started_at,
            ended_at: Some(started_at + ChronoDuration::seconds(40)),
            difficulty: Difficulty::Hard,
            final_stats: Stats {
                player_score: 3,
                computer_score: 1,
                total_rounds: 4,
                average_reaction_time: 280.0,
                best_reaction_time: Some(210),
                missed_rounds: 1,
                accuracy: 75.0,
            },
            result,
            rounds: Vec::new(),
        }
    }

    #[test]
    fn test_humanize_age_is_in_the_past() {
        let now = Local::now();
        let text = humanize_age(now - ChronoDuration::hours(2), now);
        assert!(text.contains("hour"), "{text}");
    }

    #[test]
    fn test_humanize_age_clamps_future_times() {
        let now = Local::now();
        let text = humanize_age(now + ChronoDuration::minutes(5), now);
        assert!(!text.is_empty());
    }

    #[test]
    fn test_present_row_renders_columns() {
        let row = present_row(&record(GameResult::PlayerWin), Local::now());
        let table = Table::new(vec![row], [Constraint::Length(12); 7]);
        let area = Rect::new(0, 0, 90, 1);
        let mut buf = Buffer::empty(area);
        table.render(area, &mut buf);

        let text: String = buf.content.iter().map(|c| c.symbol()).collect();
        assert!(text.contains("hard"));
        assert!(text.contains("win"));
        assert!(text.contains("3 - 1"));
        assert!(text.contains("210"));
        assert!(text.contains("75%"));
    }
}
