//! Grid model: an N×N matrix of cells.
//!
//! A `Grid` is a value. Updating a cell produces a new grid and leaves the old
//! one untouched, so snapshots that were already published never change under
//! their readers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{GameError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId {
    pub row: usize,
    pub col: usize,
}

impl CellId {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell-{}-{}", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    Idle,
    Active,
    Success,
    Failed,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub state: CellState,
    /// Logical time (ms) at which the cell became Active
    pub activated_at: Option<u64>,
    pub reaction_time_ms: Option<u64>,
}

impl Cell {
    pub fn idle(id: CellId) -> Self {
        Self {
            id,
            state: CellState::Idle,
            activated_at: None,
            reaction_time_ms: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == CellState::Active
    }

    pub fn activated(self, at: u64) -> Self {
        Self {
            state: CellState::Active,
            activated_at: Some(at),
            ..self
        }
    }

    pub fn succeeded(self, reaction_time_ms: u64) -> Self {
        Self {
            state: CellState::Success,
            reaction_time_ms: Some(reaction_time_ms),
            ..self
        }
    }

    pub fn failed(self) -> Self {
        Self {
            state: CellState::Failed,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: usize,
    cells: Arc<Vec<Cell>>,
}

impl Grid {
    /// Build a `size`×`size` grid of Idle cells with ids `(row, col)`.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(GameError::invalid_config(
                "grid_size",
                "must be a positive integer",
            ));
        }

        let cells = (0..size)
            .flat_map(|row| (0..size).map(move |col| Cell::idle(CellId::new(row, col))))
            .collect();

        Ok(Self {
            size,
            cells: Arc::new(cells),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.size)
    }

    fn index_of(&self, id: CellId) -> Option<usize> {
        (id.row < self.size && id.col < self.size).then(|| id.row * self.size + id.col)
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.index_of(id).map(|idx| &self.cells[idx])
    }

    /// Cells that may be activated next
    pub fn available_cells(&self) -> Vec<&Cell> {
        self.cells
            .iter()
            .filter(|c| c.state == CellState::Idle)
            .collect()
    }

    pub fn active_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| c.is_active())
    }

    /// Return a new grid with `cell` replacing the cell that has the same id.
    ///
    /// A cell whose id lies outside the grid leaves the grid unchanged.
    pub fn with_cell_updated(&self, cell: Cell) -> Grid {
        let Some(idx) = self.index_of(cell.id) else {
            return self.clone();
        };

        let mut cells = Vec::clone(&self.cells);
        cells[idx] = cell;
        Grid {
            size: self.size,
            cells: Arc::new(cells),
        }
    }
}
