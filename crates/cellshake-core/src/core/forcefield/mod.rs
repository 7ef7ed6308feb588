//! Pair potentials and the tabulated potential map consulted by the energy kernel.
//!
//! - [`potentials`] - Analytic functional forms (Lennard-Jones, Coulomb, harmonic)
//! - [`params`] - TOML forcefield parameter files
//! - [`potential_map`] - Per type-pair interpolation tables truncated at the map range

pub mod params;
pub mod potential_map;
pub mod potentials;
