use super::periodic_box::PeriodicBox;
use super::{CellIndex, SpaceError};
use nalgebra::Point3;
use std::collections::BTreeMap;

/// A neighbouring cell, tagged with whether distances to atoms inside it must be computed
/// under the minimum-image convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellNeighbour {
    pub index: CellIndex,
    pub requires_mim: bool,
}

impl CellNeighbour {
    pub fn new(index: CellIndex, requires_mim: bool) -> Self {
        Self {
            index,
            requires_mim,
        }
    }
}

/// A fixed spatial bucket of the simulation volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    index: CellIndex,
    grid_reference: [usize; 3],
    neighbours: Vec<CellNeighbour>,
}

impl Cell {
    #[inline]
    pub fn index(&self) -> CellIndex {
        self.index
    }

    #[inline]
    pub fn grid_reference(&self) -> [usize; 3] {
        self.grid_reference
    }

    /// All neighbours of the cell; never contains the cell itself.
    #[inline]
    pub fn neighbours(&self) -> &[CellNeighbour] {
        &self.neighbours
    }

    pub fn local_neighbours(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.neighbours
            .iter()
            .filter(|n| !n.requires_mim)
            .map(|n| n.index)
    }

    pub fn mim_neighbours(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.neighbours
            .iter()
            .filter(|n| n.requires_mim)
            .map(|n| n.index)
    }

    pub fn is_neighbour(&self, other: CellIndex) -> bool {
        self.neighbours.iter().any(|n| n.index == other)
    }
}

/// The immutable cell topology of a configuration.
///
/// Cells are laid out on an `nx * ny * nz` grid with index `x * ny * nz + y * nz + z`.
/// Neighbour lists are computed once; afterwards only the contents of the cells (kept by
/// the configuration) change.
#[derive(Debug, Clone, PartialEq)]
pub struct CellArray {
    divisions: [usize; 3],
    cells: Vec<Cell>,
    own_cell_requires_mim: bool,
}

impl CellArray {
    /// Builds a periodic grid of cells where every cell sees all cells up to `extents`
    /// steps away along each axis.
    pub fn generate(divisions: [usize; 3], extents: [usize; 3]) -> Result<Self, SpaceError> {
        if divisions.contains(&0) {
            return Err(SpaceError::InvalidDivisions(divisions));
        }

        let [nx, ny, nz] = divisions;
        let n_cells = nx * ny * nz;
        let mut cells = Vec::with_capacity(n_cells);

        for x in 0..nx {
            for y in 0..ny {
                for z in 0..nz {
                    let index = Self::flatten(divisions, [x, y, z]);
                    let mut found: BTreeMap<CellIndex, bool> = BTreeMap::new();

                    for dx in -(extents[0] as isize)..=(extents[0] as isize) {
                        for dy in -(extents[1] as isize)..=(extents[1] as isize) {
                            for dz in -(extents[2] as isize)..=(extents[2] as isize) {
                                if dx == 0 && dy == 0 && dz == 0 {
                                    continue;
                                }
                                let offsets = [dx, dy, dz];
                                let mut wrapped = [0usize; 3];
                                let mut requires_mim = false;
                                for axis in 0..3 {
                                    let raw = [x, y, z][axis] as isize + offsets[axis];
                                    let n = divisions[axis] as isize;
                                    let w = raw.rem_euclid(n);
                                    wrapped[axis] = w as usize;
                                    let span = (offsets[axis].unsigned_abs() + 1) * 2;
                                    if raw != w || span > divisions[axis] {
                                        requires_mim = true;
                                    }
                                }
                                let neighbour = Self::flatten(divisions, wrapped);
                                if neighbour == index {
                                    continue;
                                }
                                *found.entry(neighbour).or_insert(false) |= requires_mim;
                            }
                        }
                    }

                    cells.push(Cell {
                        index,
                        grid_reference: [x, y, z],
                        neighbours: found
                            .into_iter()
                            .map(|(i, mim)| CellNeighbour::new(i, mim))
                            .collect(),
                    });
                }
            }
        }

        Ok(Self {
            divisions,
            cells,
            own_cell_requires_mim: divisions.iter().any(|&d| d < 2),
        })
    }

    /// Chooses divisions so that no cell is narrower than `min_cell_size`, and extents so
    /// that every atom within `cutoff` of a cell lies in one of its neighbours.
    pub fn for_cutoff(
        periodic_box: &PeriodicBox,
        min_cell_size: f64,
        cutoff: f64,
    ) -> Result<Self, SpaceError> {
        let lengths = periodic_box.lengths();
        let mut divisions = [1usize; 3];
        let mut extents = [0usize; 3];
        for axis in 0..3 {
            let l = lengths[axis];
            divisions[axis] = ((l / min_cell_size).floor() as usize).max(1);
            let width = l / divisions[axis] as f64;
            extents[axis] = ((cutoff / width).ceil() as usize).min(divisions[axis] / 2).max(1);
        }
        Self::generate(divisions, extents)
    }

    /// Builds an arbitrary topology from explicit neighbour lists, laid out as a single row
    /// of cells along x.
    pub fn from_neighbour_lists(lists: Vec<Vec<CellNeighbour>>) -> Result<Self, SpaceError> {
        let n_cells = lists.len();
        let mut cells = Vec::with_capacity(n_cells);
        for (index, neighbours) in lists.into_iter().enumerate() {
            for n in &neighbours {
                if n.index >= n_cells {
                    return Err(SpaceError::NeighbourOutOfRange {
                        cell: index,
                        neighbour: n.index,
                        n_cells,
                    });
                }
                if n.index == index {
                    return Err(SpaceError::SelfNeighbour(index));
                }
            }
            cells.push(Cell {
                index,
                grid_reference: [index, 0, 0],
                neighbours,
            });
        }
        Ok(Self {
            divisions: [n_cells.max(1), 1, 1],
            cells,
            own_cell_requires_mim: false,
        })
    }

    #[inline]
    fn flatten(divisions: [usize; 3], [x, y, z]: [usize; 3]) -> CellIndex {
        x * divisions[1] * divisions[2] + y * divisions[2] + z
    }

    #[inline]
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn divisions(&self) -> [usize; 3] {
        self.divisions
    }

    #[inline]
    pub fn cell(&self, index: CellIndex) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Neighbour list of a cell, empty for an out-of-range index.
    pub fn neighbours(&self, index: CellIndex) -> &[CellNeighbour] {
        self.cells
            .get(index)
            .map(|c| c.neighbours())
            .unwrap_or(&[])
    }

    /// Whether two atoms sharing a cell may need the minimum-image convention.
    #[inline]
    pub fn own_cell_requires_mim(&self) -> bool {
        self.own_cell_requires_mim
    }

    /// Cell containing the (folded) point.
    pub fn cell_index_for(&self, periodic_box: &PeriodicBox, point: &Point3<f64>) -> CellIndex {
        let frac = periodic_box.fractional(point);
        let mut grid = [0usize; 3];
        for axis in 0..3 {
            let n = self.divisions[axis];
            grid[axis] = ((frac[axis] * n as f64).floor() as usize).min(n - 1);
        }
        Self::flatten(self.divisions, grid)
    }
}
