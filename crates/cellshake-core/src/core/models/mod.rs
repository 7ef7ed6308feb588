//! # Core Models Module
//!
//! Data structures describing the particle population.
//!
//! - [`ids`] - Slotmap keys for atoms and molecules
//! - [`atom`] - A single interaction site with type, position and owning cell
//! - [`species`] - Molecule templates with intramolecular terms
//! - [`molecule`] - A species instance inside a configuration
//! - [`configuration`] - The complete periodic system with cell membership bookkeeping
//! - [`builder`] - Lattice population of a configuration from a species template
//!
//! ```ignore
//! use cellshake::core::models::builder::ConfigurationBuilder;
//!
//! let cfg = ConfigurationBuilder::new(periodic_box, cells)
//!     .temperature(298.0)
//!     .species(water, 216)
//!     .build()?;
//! ```

pub mod atom;
pub mod builder;
pub mod configuration;
pub mod ids;
pub mod molecule;
pub mod species;
