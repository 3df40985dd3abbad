//! # Memolink Simulation
//!
//! Runs a phone and a watch against each other over an in-memory link that
//! can be partitioned, and reports what each device ends up listing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use memolink_simulation::{PairSimulation, ScenarioConfig};
//! use memolink_sync::SyncMode;
//!
//! let config = ScenarioConfig {
//!     mode: SyncMode::Hardened,
//!     partition: true,
//!     ..Default::default()
//! };
//! let report = PairSimulation::start(config).await?.run().await?;
//! assert!(report.converged());
//! ```

pub mod report;
pub mod scenario;

pub use report::{DeviceListing, MemoSummary, SimulationReport};
pub use scenario::{PairSimulation, ScenarioConfig, ScenarioError};
