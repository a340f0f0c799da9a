//! Geometry & kinematics for track-cluster matching.
//!
//! Tracks are compared to clusters in (eta, phi) space:
//! - the track side uses the position extrapolated to the calorimeter surface
//!   (computed upstream by the event model and carried on the record)
//! - the cluster side uses the direction of its global position
//!
//! Cluster momenta are rebuilt relative to the primary vertex, treating the
//! deposit as a massless particle.

use hadcorr_env::{CaloClusterRecord, TrackRecord};
use nalgebra::Vector3;
use std::f64::consts::PI;

/// Pseudorapidity reported for directions along the beam axis.
const BEAM_AXIS_ETA: f64 = 1e10;

// ============================================================================
// ANGLES
// ============================================================================

/// Wrap an azimuthal difference into [-π, π).
pub fn wrap_phi(dphi: f64) -> f64 {
    if !dphi.is_finite() {
        return dphi;
    }
    let wrapped = (dphi + PI).rem_euclid(2.0 * PI) - PI;
    // rem_euclid can round up to exactly 2π for tiny negative inputs
    if wrapped >= PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Pseudorapidity of a direction vector.
pub fn pseudorapidity(v: &Vector3<f64>) -> f64 {
    let rho = v.x.hypot(v.y);
    if rho > 0.0 {
        (v.z / rho).asinh()
    } else if v.z > 0.0 {
        BEAM_AXIS_ETA
    } else if v.z < 0.0 {
        -BEAM_AXIS_ETA
    } else {
        0.0
    }
}

/// Azimuth of a direction vector in (-π, π].
pub fn azimuth(v: &Vector3<f64>) -> f64 {
    if v.x == 0.0 && v.y == 0.0 {
        0.0
    } else {
        v.y.atan2(v.x)
    }
}

/// Signed angular offset of a track relative to a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularOffset {
    /// track eta - cluster eta
    pub deta: f64,
    /// track phi - cluster phi, wrapped
    pub dphi: f64,
}

impl AngularOffset {
    /// Combined distance sqrt(deta² + dphi²).
    #[inline]
    pub fn dr(&self) -> f64 {
        self.deta.hypot(self.dphi)
    }
    
    /// Rectangular window test with half-widths `phi_max` and `eta_max`.
    #[inline]
    pub fn within(&self, phi_max: f64, eta_max: f64) -> bool {
        self.dphi.abs() < phi_max && self.deta.abs() < eta_max
    }
}

// ============================================================================
// VALUE TYPES
// ============================================================================

/// A charged track as seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub momentum: Vector3<f64>,
    /// Raw charge as delivered (may be the ambiguous sentinel)
    pub charge: i16,
    pub in_acceptance: bool,
    pub calo_eta: f64,
    pub calo_phi: f64,
}

impl Track {
    /// Total momentum |p|.
    #[inline]
    pub fn p(&self) -> f64 {
        self.momentum.norm()
    }
    
    /// Transverse momentum.
    #[inline]
    pub fn pt(&self) -> f64 {
        self.momentum.x.hypot(self.momentum.y)
    }
}

impl From<&TrackRecord> for Track {
    fn from(record: &TrackRecord) -> Self {
        Self {
            momentum: Vector3::from(record.momentum),
            charge: record.charge,
            in_acceptance: record.in_acceptance,
            calo_eta: record.calo_eta,
            calo_phi: record.calo_phi,
        }
    }
}

/// A calorimeter cluster as seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub energy: f64,
    pub position: Vector3<f64>,
    pub in_acceptance: bool,
}

/// Cluster momentum rebuilt relative to a vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterKinematics {
    pub momentum: Vector3<f64>,
    /// |p|, the energy the correction operates on
    pub p: f64,
    pub pt: f64,
}

impl Cluster {
    /// Pseudorapidity of the global cluster position.
    pub fn eta(&self) -> f64 {
        pseudorapidity(&self.position)
    }
    
    /// Azimuth of the global cluster position.
    pub fn phi(&self) -> f64 {
        azimuth(&self.position)
    }
    
    /// Massless momentum pointing from `vertex` to the cluster.
    ///
    /// A cluster sitting exactly on the vertex has no direction and gets a
    /// zero momentum.
    pub fn kinematics(&self, vertex: &Vector3<f64>) -> ClusterKinematics {
        let direction = self.position - vertex;
        let r = direction.norm();
        let momentum = if r > 0.0 {
            direction * (self.energy / r)
        } else {
            Vector3::zeros()
        };
        ClusterKinematics {
            momentum,
            p: momentum.norm(),
            pt: momentum.x.hypot(momentum.y),
        }
    }
}

impl From<&CaloClusterRecord> for Cluster {
    fn from(record: &CaloClusterRecord) -> Self {
        Self {
            energy: record.energy,
            position: Vector3::from(record.position),
            in_acceptance: record.in_acceptance,
        }
    }
}

/// Angular offset between a track's calorimeter projection and a cluster.
pub fn eta_phi_diff(track: &Track, cluster: &Cluster) -> AngularOffset {
    angular_offset(track, cluster.eta(), cluster.phi())
}

/// Same as `eta_phi_diff` with the cluster direction already computed.
#[inline]
pub fn angular_offset(track: &Track, cluster_eta: f64, cluster_phi: f64) -> AngularOffset {
    AngularOffset {
        deta: track.calo_eta - cluster_eta,
        dphi: wrap_phi(track.calo_phi - cluster_phi),
    }
}
