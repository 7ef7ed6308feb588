//! # Core Module
//!
//! Fundamental building blocks shared by every other layer of the library.
//!
//! ## Architecture
//!
//! - **Spatial Index** ([`space`]) - Orthorhombic periodic box and the fixed cell array
//! - **Particle Representation** ([`models`]) - Atoms, molecules, species and the configuration
//! - **Energy Tables** ([`forcefield`]) - Pair potential parameters and tabulated potential maps
//!
//! Nothing in this module knows about locks or process groups; it only describes where
//! particles are and how they interact.

pub mod forcefield;
pub mod models;
pub mod space;
