//! # cellshake Core Library
//!
//! Replicated spatial locking, object distribution and Metropolis Monte-Carlo shaking for
//! periodic particle configurations.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Configuration`, `Species`),
//!   periodic geometry and the cell array used as the spatial index, and the tabulated
//!   pair potentials of the forcefield.
//!
//! - **[`engine`]: The Logic Core.** The stateful machinery that lets several worker groups
//!   mutate one configuration without a lock server: the cell lock engine, the round-based
//!   `Distributor` and the cycle-based `RegionalDistributor`, the `ChangeStore` transactional
//!   move buffer, the energy kernel, Metropolis sampling and the process-pool contract.
//!
//! - **[`workflows`]: The Public API.** Complete Monte-Carlo procedures (atom shake and
//!   molecule shake) that tie the engine and core together.
//!
//! ## Replicated decisions
//!
//! No lock is ever granted by message. Every process runs the distributor for every group
//! over identical replicated state and therefore derives identical lock decisions; only the
//! accepted coordinates are exchanged, and only at well defined points.

pub mod core;
pub mod engine;
pub mod workflows;
