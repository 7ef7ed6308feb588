use super::params::{AtomTypeParams, ForcefieldParams};
use super::potentials;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum PotentialMapError {
    #[error("Potential range must be positive and finite, got {0}")]
    InvalidRange(f64),
    #[error("Table spacing must be positive and smaller than the range, got {0}")]
    InvalidDelta(f64),
    #[error("At least one atom type is required")]
    NoAtomTypes,
}

/// Tabulated pair potentials for every combination of atom types.
///
/// Each table holds the Lennard-Jones plus Coulomb energy (Lorentz-Berthelot combination)
/// sampled every `delta` Å and shifted so that it reaches zero exactly at `range`. Lookups
/// interpolate linearly; any separation at or beyond the range contributes nothing.
#[derive(Debug, Clone)]
pub struct PotentialMap {
    types: Vec<AtomTypeParams>,
    range: f64,
    delta: f64,
    dielectric: f64,
    tables: Vec<Vec<f64>>,
}

impl PotentialMap {
    pub fn new(
        types: Vec<AtomTypeParams>,
        range: f64,
        delta: f64,
        dielectric: f64,
    ) -> Result<Self, PotentialMapError> {
        if !range.is_finite() || range <= 0.0 {
            return Err(PotentialMapError::InvalidRange(range));
        }
        if !delta.is_finite() || delta <= 0.0 || delta >= range {
            return Err(PotentialMapError::InvalidDelta(delta));
        }
        if types.is_empty() {
            return Err(PotentialMapError::NoAtomTypes);
        }

        let mut map = Self {
            types,
            range,
            delta,
            dielectric,
            tables: Vec::new(),
        };

        let n_points = (range / delta).ceil() as usize + 1;
        let n_types = map.types.len();
        map.tables = Vec::with_capacity(n_types * n_types);
        for i in 0..n_types {
            for j in 0..n_types {
                let shift = map.analytic_energy(i, j, range);
                let table = (0..n_points)
                    .map(|k| {
                        let r = k as f64 * delta;
                        if r >= range {
                            0.0
                        } else {
                            map.analytic_energy(i, j, r) - shift
                        }
                    })
                    .collect();
                map.tables.push(table);
            }
        }

        Ok(map)
    }

    pub fn from_params(params: &ForcefieldParams) -> Result<Self, PotentialMapError> {
        Self::new(
            params.atom_types.clone(),
            params.range,
            params.table_delta,
            params.dielectric,
        )
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.range
    }

    #[inline]
    pub fn n_types(&self) -> usize {
        self.types.len()
    }

    pub fn type_name(&self, index: usize) -> Option<&str> {
        self.types.get(index).map(|t| t.name.as_str())
    }

    /// Unshifted, untabulated energy of a pair of types at separation `r`.
    pub fn analytic_energy(&self, type_i: usize, type_j: usize, r: f64) -> f64 {
        let (Some(a), Some(b)) = (self.types.get(type_i), self.types.get(type_j)) else {
            return 0.0;
        };
        let r_min = 0.5 * (a.radius + b.radius);
        let well_depth = (a.well_depth * b.well_depth).sqrt();
        let mut energy = potentials::lennard_jones_12_6(r, r_min, well_depth);
        if a.charge != 0.0 && b.charge != 0.0 {
            energy += potentials::coulomb(r, a.charge, b.charge, self.dielectric);
        }
        energy
    }

    /// Interpolated, shifted pair energy; zero at or beyond the range.
    #[inline]
    pub fn energy(&self, type_i: usize, type_j: usize, r: f64) -> f64 {
        if r >= self.range || r < 0.0 {
            return 0.0;
        }
        let n_types = self.types.len();
        if type_i >= n_types || type_j >= n_types {
            return 0.0;
        }
        let table = &self.tables[type_i * n_types + type_j];
        let x = r / self.delta;
        let k = x.floor() as usize;
        if k + 1 >= table.len() {
            return table[table.len() - 1];
        }
        let frac = x - k as f64;
        table[k] * (1.0 - frac) + table[k + 1] * frac
    }
}
