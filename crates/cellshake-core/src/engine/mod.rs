//! # Engine Module
//!
//! The stateful machinery that lets several worker groups shake one configuration
//! concurrently without a lock server.
//!
//! ## Architecture
//!
//! - **Process Pool** ([`pool`]) - The narrow collective-communication contract and a local implementation
//! - **Cell Locks** ([`locks`]) - Replicated hard/soft lock bookkeeping over the cell array
//! - **Distributors** ([`distributor`], [`regional`]) - Round-based and cycle-based work assignment
//! - **Change Tracking** ([`change_store`]) - Stage, commit, revert and redistribute coordinate changes
//! - **Energy Kernel** ([`kernel`]) - Pair and intramolecular energies with cutoff truncation
//! - **Sampling** ([`sampling`]) - Metropolis acceptance and adaptive step sizes
//! - **Configuration** ([`config`]) - Monte-Carlo stage parameters and their builder
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Results** ([`state`]) - Statistics returned by a completed stage
//! - **Error Handling** ([`error`]) - Engine-wide error type
//!
//! Every decision about who may touch which cell is computed redundantly, and identically,
//! by every process. Correctness therefore rests on all replicas seeing the same inputs,
//! which the change store guarantees by exchanging accepted coordinates at the points where
//! the distributor asks for it.

pub mod change_store;
pub mod config;
pub mod distributor;
pub mod error;
pub mod kernel;
pub mod locks;
pub mod pool;
pub mod progress;
pub mod regional;
pub mod sampling;
pub mod state;
