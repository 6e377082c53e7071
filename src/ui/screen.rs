use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget},
};

use reflex_grid::{analytics::performance_metrics, clock::Clock, session::GameResult};

use crate::ui::{charting, history::render_history, render_game};
use crate::{App, AppState};

/// A UI screen boundary: renders one `AppState`
pub trait Screen<C: Clock> {
    fn render(&self, app: &App<C>, area: Rect, buf: &mut Buffer);
}

pub struct GameScreen;

impl<C: Clock> Screen<C> for GameScreen {
    fn render(&self, app: &App<C>, area: Rect, buf: &mut Buffer) {
        render_game(app, area, buf);
    }
}

/// Final score, reaction chart and overall progress of the last game
pub struct ResultsScreen;

impl<C: Clock> Screen<C> for ResultsScreen {
    fn render(&self, app: &App<C>, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(5)
            .vertical_margin(1)
            .constraints([
                Constraint::Length(1), // headline
                Constraint::Length(1), // stats
                Constraint::Min(1),    // chart
                Constraint::Length(1), // overall progress
                Constraint::Length(1), // padding
                Constraint::Length(1), // legend
            ])
            .split(area);

        let snapshot = app.session.snapshot();
        let stats = snapshot.stats;

        let (headline, color) = match snapshot.result {
            Some(GameResult::PlayerWin) => ("You win!", Color::Green),
            Some(GameResult::ComputerWin) => ("The computer wins", Color::Red),
            None => ("Game over", Color::Gray),
        };
        Paragraph::new(Span::styled(
            format!(
                "{headline}   {} - {}",
                stats.player_score, stats.computer_score
            ),
            bold_style.fg(color),
        ))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        Paragraph::new(Span::styled(
            format!(
                "{:.0}ms avg   {} best   {:.0}% acc   {} missed",
                stats.average_reaction_time,
                stats
                    .best_reaction_time
                    .map_or(String::from("-"), |ms| format!("{ms}ms")),
                stats.accuracy,
                stats.missed_rounds
            ),
            bold_style,
        ))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

        let rounds = app.session.rounds();
        let limit = snapshot.config.reaction_time_ms;
        let hits = charting::reaction_points(rounds);
        let misses = charting::miss_points(rounds, limit);
        let all = hits.iter().chain(misses.iter()).copied().collect::<Vec<_>>();
        let (last_round, slowest) = charting::compute_chart_params(&all, limit);

        let datasets = vec![
            Dataset::default()
                .name("reaction")
                .marker(Marker::Braille)
                .style(Style::default().fg(Color::Magenta))
                .graph_type(GraphType::Line)
                .data(&hits),
            Dataset::default()
                .name("missed")
                .marker(Marker::Dot)
                .style(Style::default().fg(Color::Red))
                .graph_type(GraphType::Scatter)
                .data(&misses),
        ];

        Chart::new(datasets)
            .x_axis(
                Axis::default()
                    .title("round")
                    .bounds([1.0, last_round])
                    .labels(vec![
                        Span::styled("1", bold_style),
                        Span::styled(charting::format_label(last_round), bold_style),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("ms")
                    .bounds([0.0, slowest])
                    .labels(vec![
                        Span::styled("0", bold_style),
                        Span::styled(charting::format_label(slowest), bold_style),
                    ]),
            )
            .render(chunks[2], buf);

        let overall = performance_metrics(&app.records);
        Paragraph::new(Line::from(Span::styled(
            format!(
                "overall: {} games   {:.0}ms avg   trend {:+.1}   streak {}",
                app.records.len(),
                overall.average_reaction_time,
                overall.improvement_trend,
                overall.streak_length
            ),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::ITALIC),
        )))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

        Paragraph::new(Span::styled(
            "(s) play again / (r)eset / (h)istory / (esc)ape",
            italic_style,
        ))
        .render(chunks[5], buf);
    }
}

pub struct HistoryScreen;

impl<C: Clock> Screen<C> for HistoryScreen {
    fn render(&self, app: &App<C>, area: Rect, buf: &mut Buffer) {
        render_history(app, area, buf);
    }
}

pub fn current_screen<C: Clock>(state: AppState) -> Box<dyn Screen<C>> {
    match state {
        AppState::Game => Box::new(GameScreen),
        AppState::Results => Box::new(ResultsScreen),
        AppState::History => Box::new(HistoryScreen),
    }
}
