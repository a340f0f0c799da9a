//! HadCorr Core - Hadronic Correction of Calorimeter Clusters
//!
//! Charged particles leave part of their energy in the calorimeter. This
//! library removes that contribution per event:
//! 1. **Matching**: tracks and clusters are paired by nearest neighbour in
//!    (eta, phi), optionally requiring mutual association
//! 2. **Correction**: the momentum of the closest (or of every) matched track
//!    is subtracted from the cluster energy, floored at zero
//! 3. **Accumulation**: diagnostic histograms binned by centrality,
//!    momentum and charge are filled for the whole job
//!
//! `HadCorrProcessor` drives the three stages for each `InputEvent` and
//! publishes the corrected clusters into the job's object registry.

pub mod accumulator;
pub mod binning;
pub mod config;
pub mod correction;
pub mod error;
pub mod histogram;
pub mod kinematics;
pub mod matching;
pub mod processor;

// Re-export key types for convenience
pub use accumulator::{Accumulator, HistogramSet};
pub use binning::{centrality_bin, momentum_bin, ChargeClass, MatchCountClass};
pub use config::{CorrectionMode, HadCorrConfig};
pub use correction::{ClosestTrack, Correction, Corrector};
pub use error::HadCorrError;
pub use histogram::{Hist1D, Hist2D, Histogram, HistogramError, HistogramList};
pub use kinematics::{eta_phi_diff, AngularOffset, Cluster, ClusterKinematics, Track};
pub use matching::{MatchResult, MatchingWindow, TrackAssociations, TrackClusterMatcher, TrackMatch};
pub use processor::{ClusterOutcome, EventOutcome, HadCorrProcessor, JobSummary, PartialResult};
