//! Periodic geometry and the cell array spatial index.
//!
//! Cells have a fixed topology for the whole simulation; only the set of atoms they hold
//! changes. Every neighbour entry records whether reaching it crosses a periodic boundary,
//! so distance evaluations can skip the minimum-image correction where it is not needed.

pub mod cell_array;
pub mod periodic_box;

use thiserror::Error;

/// Index of a cell inside a [`cell_array::CellArray`].
pub type CellIndex = usize;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum SpaceError {
    #[error("Box lengths must be positive and finite, got {0:?}")]
    InvalidBoxLengths([f64; 3]),

    #[error("Cell divisions must be at least one along every axis, got {0:?}")]
    InvalidDivisions([usize; 3]),

    #[error("Cell {cell} lists neighbour {neighbour}, but only {n_cells} cells exist")]
    NeighbourOutOfRange {
        cell: CellIndex,
        neighbour: CellIndex,
        n_cells: usize,
    },

    #[error("Cell {0} lists itself as a neighbour")]
    SelfNeighbour(CellIndex),
}
