//! HadCorr Simulation Harness
//!
//! Deterministic event generation and end-to-end runs of the hadronic
//! correction.
//!
//! # Core Principle: Seeded Events
//!
//! All randomness is derived from one 64-bit seed; every event number gets
//! its own ChaCha stream. A run therefore produces the same histograms for
//! the same seed, whatever the number of worker threads.
//!
//! # Usage
//!
//! ```ignore
//! use hadcorr_sim::{ScenarioRunner, scenarios::ScenarioId};
//! use hadcorr_core::HadCorrConfig;
//!
//! let runner = ScenarioRunner::new(42, HadCorrConfig::default())
//!     .with_events(10_000)
//!     .with_workers(4);
//! let result = runner.run(ScenarioId::Random)?;
//! ```

mod exporter;
mod generator;
mod runner;
pub mod scenarios;

pub use exporter::HistogramExport;
pub use generator::{EventGenerator, GeneratorConfig, GeneratorError};
pub use runner::{run_generated, run_source, EventLog, RunError, RunReport, ScenarioResult, ScenarioRunner};
