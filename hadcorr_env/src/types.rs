//! External record types exchanged with the hosting framework.
//!
//! These are the "wire" representations of tracks and calorimeter clusters.
//! The engine converts them into its own value types at the boundary and
//! only writes back the matching-result slots through an explicit step.

use serde::{Deserialize, Serialize};

/// Raw charge value used by some track formats for "unknown/ambiguous".
pub const AMBIGUOUS_CHARGE: i16 = 255;

/// Sentinel index meaning "no associated partner".
pub const NO_MATCH: i32 = -1;

/// Sentinel angular distance written onto clusters without a matched track.
pub const UNMATCHED_DISTANCE: f64 = 1e9;

/// Event data model the input was produced in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventModel {
    /// Full reconstruction output
    Esd,
    /// Reduced analysis object data
    Aod,
    /// Anything else the engine does not know how to copy clusters for
    Other(String),
}

impl std::fmt::Display for EventModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventModel::Esd => write!(f, "ESD"),
            EventModel::Aod => write!(f, "AOD"),
            EventModel::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A reconstructed charged-particle track as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Momentum [px, py, pz] in GeV/c
    pub momentum: [f64; 3],
    
    /// Charge: +1, -1, or `AMBIGUOUS_CHARGE`
    pub charge: i16,
    
    /// Track points into the calorimeter acceptance
    pub in_acceptance: bool,
    
    /// Pseudorapidity of the track extrapolated to the calorimeter surface
    pub calo_eta: f64,
    
    /// Azimuth of the track extrapolated to the calorimeter surface
    pub calo_phi: f64,
    
    /// Index of the associated cluster, or `NO_MATCH`
    pub calo_cluster: i32,
}

impl TrackRecord {
    /// Creates an in-acceptance track with no cluster association.
    pub fn new(momentum: [f64; 3], charge: i16, calo_eta: f64, calo_phi: f64) -> Self {
        Self {
            momentum,
            charge,
            in_acceptance: true,
            calo_eta,
            calo_phi,
            calo_cluster: NO_MATCH,
        }
    }
    
    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.momentum[0].hypot(self.momentum[1])
    }
    
    /// Associated cluster index, if any.
    pub fn cluster_index(&self) -> Option<usize> {
        usize::try_from(self.calo_cluster).ok()
    }
}

/// A calorimeter cluster as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaloClusterRecord {
    /// Deposited energy in GeV
    pub energy: f64,
    
    /// Global cluster position [x, y, z] in cm
    pub position: [f64; 3],
    
    /// Cluster belongs to the calorimeter this engine corrects
    pub in_acceptance: bool,
    
    /// Index of the nearest track, or `NO_MATCH`
    pub nearest_track: i32,
    
    /// Azimuthal offset to the nearest track
    pub track_dphi: f64,
    
    /// Pseudorapidity offset to the nearest track
    pub track_deta: f64,
}

impl CaloClusterRecord {
    /// Creates an in-acceptance cluster with reset matching fields.
    pub fn new(energy: f64, position: [f64; 3]) -> Self {
        Self {
            energy,
            position,
            in_acceptance: true,
            nearest_track: NO_MATCH,
            track_dphi: UNMATCHED_DISTANCE,
            track_deta: UNMATCHED_DISTANCE,
        }
    }
    
    /// Nearest track index, if any.
    pub fn nearest_track_index(&self) -> Option<usize> {
        usize::try_from(self.nearest_track).ok()
    }
}
