pub mod charting;
pub mod history;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
    Frame,
};

use reflex_grid::{
    clock::Clock,
    grid::{CellId, CellState, Grid},
    session::SessionState,
    stats::{Side, Stats},
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

pub fn draw<C: Clock>(app: &App<C>, f: &mut Frame) {
    f.render_widget(app, f.area());
}

impl<C: Clock> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        screen::current_screen::<C>(self.state).render(self, area, buf);
    }
}

/// Header, grid, status line and legend of the game screen
pub struct GameLayout {
    pub header: Rect,
    pub grid: Rect,
    pub status: Rect,
    pub legend: Rect,
}

pub fn game_layout(area: Rect) -> GameLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    GameLayout {
        header: chunks[0],
        grid: chunks[1],
        status: chunks[2],
        legend: chunks[3],
    }
}

/// Placement of the cells inside the grid area. Each cell takes a slot of
/// `cell_width`×`cell_height`; the last column (and row, when there is room)
/// of a slot is left blank as a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub origin_x: u16,
    pub origin_y: u16,
    pub cell_width: u16,
    pub cell_height: u16,
    pub size: usize,
}

impl GridGeometry {
    /// Center a `size`×`size` grid in `area`, or `None` when it cannot fit.
    pub fn fit(area: Rect, size: usize) -> Option<Self> {
        let n = u16::try_from(size).ok().filter(|n| *n > 0)?;

        let cell_width = [6u16, 4, 3]
            .into_iter()
            .find(|w| w.saturating_mul(n) <= area.width)?;
        let cell_height = [2u16, 1]
            .into_iter()
            .find(|h| h.saturating_mul(n) <= area.height)?;

        Some(Self {
            origin_x: area.x + (area.width - cell_width * n) / 2,
            origin_y: area.y + (area.height - cell_height * n) / 2,
            cell_width,
            cell_height,
            size,
        })
    }

    fn drawn_height(&self) -> u16 {
        if self.cell_height > 1 {
            self.cell_height - 1
        } else {
            1
        }
    }

    pub fn cell_rect(&self, id: CellId) -> Rect {
        Rect::new(
            self.origin_x + id.col as u16 * self.cell_width,
            self.origin_y + id.row as u16 * self.cell_height,
            self.cell_width - 1,
            self.drawn_height(),
        )
    }

    /// Cell under the terminal position, gaps excluded
    pub fn cell_at(&self, column: u16, row: u16) -> Option<CellId> {
        let dx = column.checked_sub(self.origin_x)?;
        let dy = row.checked_sub(self.origin_y)?;

        let col = (dx / self.cell_width) as usize;
        let row_idx = (dy / self.cell_height) as usize;
        if col >= self.size || row_idx >= self.size {
            return None;
        }
        if dx % self.cell_width >= self.cell_width - 1 || dy % self.cell_height >= self.drawn_height()
        {
            return None;
        }
        Some(CellId::new(row_idx, col))
    }
}

/// Map a mouse position on a full-screen game view to the cell it hits
pub fn hit_test(area: Rect, grid_size: usize, column: u16, row: u16) -> Option<CellId> {
    GridGeometry::fit(game_layout(area).grid, grid_size)?.cell_at(column, row)
}

pub fn cell_style(state: CellState) -> Style {
    match state {
        CellState::Idle => Style::default().bg(Color::DarkGray),
        CellState::Active => Style::default()
            .bg(Color::Yellow)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
        CellState::Success => Style::default().bg(Color::Green),
        CellState::Failed => Style::default().bg(Color::Red),
        CellState::Disabled => Style::default().bg(Color::Black),
    }
}

pub fn render_grid(grid: &Grid, cursor: Option<CellId>, area: Rect, buf: &mut Buffer) {
    let Some(geometry) = GridGeometry::fit(area, grid.size()) else {
        Paragraph::new(Span::styled(
            "terminal too small for this grid",
            Style::default().fg(Color::Yellow),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
        return;
    };

    for cell in grid.cells() {
        let rect = geometry.cell_rect(cell.id);
        buf.set_style(rect, cell_style(cell.state));
        if cursor == Some(cell.id) {
            let mid_x = rect.x + rect.width / 2;
            buf.set_string(
                mid_x,
                rect.y,
                "•",
                cell_style(cell.state).fg(Color::White),
            );
        }
    }
}

/// Scoreboard separator pointing at whoever is ahead
pub fn score_separator(stats: &Stats) -> &'static str {
    match stats.leader() {
        Some(Side::Player) => "  >  ",
        Some(Side::Computer) => "  <  ",
        None => "  :  ",
    }
}

pub(crate) fn render_game<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let layout = game_layout(area);
    let snapshot = app.session.snapshot();
    let stats = snapshot.stats;
    let config = snapshot.config;

    let score = Line::from(vec![
        Span::styled(
            format!("You {}", stats.player_score),
            bold_style.fg(Color::Green),
        ),
        Span::raw(score_separator(&stats)),
        Span::styled(
            format!("{} Computer", stats.computer_score),
            bold_style.fg(Color::Red),
        ),
        Span::styled(format!("   first to {}", config.max_score), dim_style),
    ]);

    let round = snapshot
        .round
        .map_or(String::from("-"), |r| r.round_number.to_string());
    let info = Line::from(Span::styled(
        format!(
            "{} · {} · {}x{} · {}ms to react · round {}",
            snapshot.state,
            config.difficulty,
            config.grid_size,
            config.grid_size,
            config.reaction_time_ms,
            round
        ),
        dim_style,
    ));

    let reaction = Line::from(Span::styled(
        format!(
            "avg {:.0}ms   best {}   accuracy {:.0}%",
            stats.average_reaction_time,
            stats
                .best_reaction_time
                .map_or(String::from("-"), |ms| format!("{ms}ms")),
            stats.accuracy
        ),
        dim_style,
    ));

    Paragraph::new(vec![score, info, reaction])
        .alignment(Alignment::Center)
        .render(layout.header, buf);

    render_grid(&snapshot.grid, Some(app.cursor), layout.grid, buf);

    let status = app.status.clone().unwrap_or_else(|| match snapshot.state {
        SessionState::Idle => String::from("press (s) to start"),
        SessionState::Playing => String::from("click the lit cell!"),
        SessionState::Paused => String::from("paused, (p) to resume"),
        SessionState::Finished => String::from("game over"),
    });
    Paragraph::new(Span::styled(status, bold_style.fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(layout.status, buf);

    let mute = if app.feedback.is_muted() {
        "un(m)ute"
    } else {
        "(m)ute"
    };
    Paragraph::new(Span::styled(
        format!(
            "(s)tart / (p)ause / (x) stop / (r)eset / (1-4) difficulty / (+/-) size / {mute} / (h)istory / (esc)ape"
        ),
        italic_style,
    ))
    .wrap(Wrap { trim: true })
    .render(layout.legend, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_text(buf: &Buffer) -> String {
        buf.content.iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn geometry_centers_grid() {
        let area = Rect::new(0, 0, 40, 10);
        let g = GridGeometry::fit(area, 5).unwrap();
        assert_eq!(g.cell_width, 6);
        assert_eq!(g.cell_height, 2);
        assert_eq!(g.origin_x, 5);
        assert_eq!(g.origin_y, 0);
        assert_eq!(g.cell_rect(CellId::new(1, 2)), Rect::new(17, 2, 5, 1));
    }

    #[test]
    fn geometry_shrinks_then_gives_up() {
        let g = GridGeometry::fit(Rect::new(0, 0, 30, 10), 10).unwrap();
        assert_eq!((g.cell_width, g.cell_height), (3, 1));
        assert!(GridGeometry::fit(Rect::new(0, 0, 20, 10), 10).is_none());
        assert!(GridGeometry::fit(Rect::new(0, 0, 20, 10), 0).is_none());
    }

    #[test]
    fn cell_at_maps_positions_and_skips_gaps() {
        let g = GridGeometry::fit(Rect::new(0, 0, 24, 8), 4).unwrap();
        assert_eq!(g.cell_at(0, 0), Some(CellId::new(0, 0)));
        assert_eq!(g.cell_at(4, 0), Some(CellId::new(0, 0)));
        assert_eq!(g.cell_at(5, 0), None);
        assert_eq!(g.cell_at(6, 2), Some(CellId::new(1, 1)));
        assert_eq!(g.cell_at(6, 3), None);
        assert_eq!(g.cell_at(23, 7), None);
        assert_eq!(g.cell_at(24, 0), None);
    }

    #[test]
    fn cell_at_agrees_with_cell_rect() {
        let g = GridGeometry::fit(Rect::new(3, 2, 50, 30), 7).unwrap();
        for row in 0..7 {
            for col in 0..7 {
                let id = CellId::new(row, col);
                let r = g.cell_rect(id);
                assert_eq!(g.cell_at(r.x, r.y), Some(id));
                assert_eq!(g.cell_at(r.x + r.width - 1, r.y), Some(id));
            }
        }
    }

    #[test]
    fn hit_test_uses_game_layout() {
        let area = Rect::new(0, 0, 80, 30);
        let grid_area = game_layout(area).grid;
        let g = GridGeometry::fit(grid_area, 5).unwrap();
        let target = g.cell_rect(CellId::new(3, 4));
        assert_eq!(
            hit_test(area, 5, target.x, target.y),
            Some(CellId::new(3, 4))
        );
        assert_eq!(hit_test(area, 5, 0, 0), None);
    }

    #[test]
    fn render_grid_colors_cells_by_state() {
        let grid = Grid::new(3).unwrap();
        let lit = grid.cells()[4].activated(0);
        let grid = grid.with_cell_updated(lit);

        let area = Rect::new(0, 0, 18, 6);
        let mut buf = Buffer::empty(area);
        render_grid(&grid, None, area, &mut buf);

        let g = GridGeometry::fit(area, 3).unwrap();
        let r = g.cell_rect(lit.id);
        assert_eq!(buf[(r.x, r.y)].bg, Color::Yellow);
        let idle = g.cell_rect(CellId::new(0, 0));
        assert_eq!(buf[(idle.x, idle.y)].bg, Color::DarkGray);
    }

    #[test]
    fn score_separator_points_at_leader() {
        let mut stats = Stats::new();
        assert_eq!(score_separator(&stats), "  :  ");
        stats.player_score = 2;
        stats.computer_score = 1;
        assert_eq!(score_separator(&stats), "  >  ");
        stats.computer_score = 3;
        assert_eq!(score_separator(&stats), "  <  ");
    }

    #[test]
    fn render_grid_reports_small_terminal() {
        let grid = Grid::new(10).unwrap();
        let area = Rect::new(0, 0, 40, 4);
        let mut buf = Buffer::empty(area);
        render_grid(&grid, None, area, &mut buf);
        assert!(buffer_text(&buf).contains("too small"));
    }
}
