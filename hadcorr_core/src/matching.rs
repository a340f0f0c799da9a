//! The "MATCHING" Engine - Track ↔ Cluster Association Layer
//!
//! Associates charged tracks with calorimeter clusters by nearest neighbour
//! in (eta, phi):
//! - Reverse pass (track → cluster): every track picks its closest cluster,
//!   which becomes the track's association
//! - Forward pass (cluster → track): every cluster finds its closest track,
//!   counts the tracks inside the matching window and sums their momenta
//!
//! When the reverse pass runs, the forward pass only counts tracks whose
//! association points back at the cluster (mutual nearest neighbours).
//!
//! This module implements the 3-stage pipeline:
//! 1. Selection (null slots, acceptance, minimum pt)
//! 2. Reverse association (optional)
//! 3. Forward matching

use crate::config::HadCorrConfig;
use crate::kinematics::{angular_offset, AngularOffset, Cluster, ClusterKinematics, Track};
use hadcorr_env::{CaloClusterRecord, TrackRecord, UNMATCHED_DISTANCE};
use nalgebra::Vector3;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Candidates farther than this are ignored by the reverse pass.
pub const REVERSE_MAX_DR: f64 = 25.0;

/// Fixed reverse-pass counting window in phi (pp running conditions).
pub const REVERSE_PHI_WINDOW: f64 = 0.05;

/// Fixed reverse-pass counting window in eta (pp running conditions).
pub const REVERSE_ETA_WINDOW: f64 = 0.025;

/// Rectangular matching window in (phi, eta).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingWindow {
    /// Half-width in phi
    pub phi: f64,

    /// Half-width in eta
    pub eta: f64,
}

impl MatchingWindow {
    /// Window used by the reverse pass, independent of configuration.
    pub const REVERSE: MatchingWindow = MatchingWindow {
        phi: REVERSE_PHI_WINDOW,
        eta: REVERSE_ETA_WINDOW,
    };

    #[inline]
    pub fn contains(&self, offset: &AngularOffset) -> bool {
        offset.within(self.phi, self.eta)
    }
}

// ============================================================================
// SELECTED INPUT
// ============================================================================

/// A track that passed selection, with its slot index in the input collection.
#[derive(Debug, Clone)]
pub struct SelectedTrack {
    pub index: usize,
    pub track: Track,
}

/// A cluster that passed selection, with its vertex-relative kinematics.
#[derive(Debug, Clone)]
pub struct SelectedCluster {
    pub index: usize,
    pub cluster: Cluster,
    pub kinematics: ClusterKinematics,
    /// Cached pseudorapidity of the global position
    pub eta: f64,
    /// Cached azimuth of the global position
    pub phi: f64,
}

impl SelectedCluster {
    /// Offset of `track` relative to this cluster.
    #[inline]
    pub fn offset(&self, track: &Track) -> AngularOffset {
        angular_offset(track, self.eta, self.phi)
    }

    /// Energy the correction operates on (|p| of the rebuilt momentum).
    #[inline]
    pub fn energy(&self) -> f64 {
        self.kinematics.p
    }
}

/// Keep non-null, in-acceptance tracks with `pt >= min_pt`.
pub fn select_tracks(records: &[Option<TrackRecord>], min_pt: f64) -> Vec<SelectedTrack> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let track = Track::from(slot.as_ref()?);
            if !track.in_acceptance || track.pt() < min_pt {
                return None;
            }
            Some(SelectedTrack { index, track })
        })
        .collect()
}

/// Keep non-null, in-acceptance clusters whose vertex-relative pt is `>= min_pt`.
pub fn select_clusters(
    records: &[Option<CaloClusterRecord>],
    vertex: &Vector3<f64>,
    min_pt: f64,
) -> Vec<SelectedCluster> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let cluster = Cluster::from(slot.as_ref()?);
            if !cluster.in_acceptance {
                return None;
            }
            let kinematics = cluster.kinematics(vertex);
            if kinematics.pt < min_pt {
                return None;
            }
            Some(SelectedCluster {
                index,
                eta: cluster.eta(),
                phi: cluster.phi(),
                cluster,
                kinematics,
            })
        })
        .collect()
}

// ============================================================================
// RESULTS
// ============================================================================

/// Closest partner found by a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    /// Slot index of the partner in its input collection
    pub index: usize,

    /// Signed offset (track - cluster)
    pub offset: AngularOffset,

    /// Combined distance
    pub dr: f64,
}

/// Outcome of matching one cluster against all tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Closest track, whether or not it is inside the window
    pub nearest: Option<Nearest>,

    /// Tracks counted inside the window (after the association gate)
    pub n_matches: usize,

    /// Summed |p| of the counted tracks
    pub total_p: f64,
}

impl MatchResult {
    /// Nearest-track offsets in the (dphi, deta) form written onto clusters.
    ///
    /// Clusters without any track get the unmatched sentinel.
    pub fn track_distance(&self) -> (f64, f64) {
        match self.nearest {
            Some(n) => (n.offset.dphi, n.offset.deta),
            None => (UNMATCHED_DISTANCE, UNMATCHED_DISTANCE),
        }
    }
}

/// Outcome of matching one track against all clusters (reverse pass).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMatch {
    /// Slot index of the track
    pub track_index: usize,

    /// Closest cluster within the pre-filter
    pub nearest_cluster: Option<usize>,

    /// Clusters inside the fixed reverse window
    pub n_matches: usize,
}

/// Track → cluster associations produced by the reverse pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackAssociations {
    /// Indexed by track slot; `None` for unassociated or unselected tracks
    slots: Vec<Option<usize>>,
}

impl TrackAssociations {
    /// Build from reverse-pass results over a collection of `n_tracks` slots.
    pub fn from_matches(n_tracks: usize, matches: &[TrackMatch]) -> Self {
        let mut slots = vec![None; n_tracks];
        for m in matches {
            if let Some(slot) = slots.get_mut(m.track_index) {
                *slot = m.nearest_cluster;
            }
        }
        Self { slots }
    }

    /// Associated cluster of a track, if any.
    pub fn get(&self, track_index: usize) -> Option<usize> {
        self.slots.get(track_index).copied().flatten()
    }

    /// True if the track is associated with exactly this cluster.
    pub fn points_to(&self, track_index: usize, cluster_index: usize) -> bool {
        self.get(track_index) == Some(cluster_index)
    }

    /// Number of track slots covered.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ============================================================================
// MATCHER (The Engine)
// ============================================================================

/// Nearest-neighbour matcher between tracks and clusters.
#[derive(Debug, Clone)]
pub struct TrackClusterMatcher {
    /// Window for counting tracks in the forward pass
    window: MatchingWindow,
}

impl TrackClusterMatcher {
    /// Create a matcher with an explicit forward window.
    pub fn new(window: MatchingWindow) -> Self {
        Self { window }
    }

    /// Create a matcher using the configured window.
    pub fn from_config(config: &HadCorrConfig) -> Self {
        Self::new(MatchingWindow {
            phi: config.phi_match,
            eta: config.eta_match,
        })
    }

    /// The forward-pass window.
    pub fn window(&self) -> MatchingWindow {
        self.window
    }

    // ========================================================================
    // REVERSE PASS
    // ========================================================================

    /// Find the closest cluster for one track.
    ///
    /// Candidates beyond `REVERSE_MAX_DR` are skipped entirely; the count uses
    /// the fixed `MatchingWindow::REVERSE`.
    pub fn match_track(&self, track: &SelectedTrack, clusters: &[SelectedCluster]) -> TrackMatch {
        let mut dr_min = UNMATCHED_DISTANCE.hypot(UNMATCHED_DISTANCE);
        let mut nearest_cluster = None;
        let mut n_matches = 0;

        for candidate in clusters {
            let offset = candidate.offset(&track.track);
            let dr = offset.dr();
            // Also rejects NaN
            if !(dr <= REVERSE_MAX_DR) {
                continue;
            }
            if dr < dr_min {
                dr_min = dr;
                nearest_cluster = Some(candidate.index);
            }
            if MatchingWindow::REVERSE.contains(&offset) {
                n_matches += 1;
            }
        }

        TrackMatch {
            track_index: track.index,
            nearest_cluster,
            n_matches,
        }
    }

    /// Run the reverse pass over all selected tracks.
    pub fn match_tracks(&self, tracks: &[SelectedTrack], clusters: &[SelectedCluster]) -> Vec<TrackMatch> {
        tracks
            .iter()
            .map(|track| self.match_track(track, clusters))
            .collect()
    }

    // ========================================================================
    // FORWARD PASS
    // ========================================================================

    /// Match one cluster against all selected tracks.
    ///
    /// `associations` enables the mutual-association gate: a track inside the
    /// window is only counted if it is associated with this cluster.
    /// `visit` sees every scanned track with its offset (used for residual
    /// diagnostics) and must not influence the result.
    pub fn match_cluster<F>(
        &self,
        cluster: &SelectedCluster,
        tracks: &[SelectedTrack],
        associations: Option<&TrackAssociations>,
        mut visit: F,
    ) -> MatchResult
    where
        F: FnMut(&SelectedTrack, &AngularOffset),
    {
        let mut best: Option<Nearest> = None;
        let mut dr_min = UNMATCHED_DISTANCE;
        let mut n_matches = 0;
        let mut total_p = 0.0;

        for candidate in tracks {
            let offset = candidate.offset_to(cluster);
            let dr = offset.dr();
            if dr < dr_min {
                dr_min = dr;
                best = Some(Nearest {
                    index: candidate.index,
                    offset,
                    dr,
                });
            }

            visit(candidate, &offset);

            if self.window.contains(&offset) && Self::gate_passes(associations, candidate.index, cluster.index) {
                n_matches += 1;
                total_p += candidate.track.p();
            }
        }

        MatchResult {
            nearest: best,
            n_matches,
            total_p,
        }
    }

    /// Mutual-association gate; always open when the reverse pass is off.
    #[inline]
    pub fn gate_passes(associations: Option<&TrackAssociations>, track_index: usize, cluster_index: usize) -> bool {
        associations.map_or(true, |a| a.points_to(track_index, cluster_index))
    }

    /// True if the nearest track lies inside the forward window.
    pub fn nearest_in_window(&self, result: &MatchResult) -> bool {
        result
            .nearest
            .is_some_and(|n| self.window.contains(&n.offset))
    }
}

impl SelectedTrack {
    /// Offset of this track relative to `cluster`.
    #[inline]
    pub fn offset_to(&self, cluster: &SelectedCluster) -> AngularOffset {
        cluster.offset(&self.track)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const R_CALO: f64 = 440.0;

    fn cluster_record(eta: f64, phi: f64, energy: f64) -> CaloClusterRecord {
        CaloClusterRecord::new(
            energy,
            [R_CALO * phi.cos(), R_CALO * phi.sin(), R_CALO * eta.sinh()],
        )
    }

    /// Track with |p| == pt == `p`, projected to (eta, phi).
    fn track_record(eta: f64, phi: f64, p: f64) -> TrackRecord {
        TrackRecord::new([p * phi.cos(), p * phi.sin(), 0.0], 1, eta, phi)
    }

    fn select(
        tracks: &[Option<TrackRecord>],
        clusters: &[Option<CaloClusterRecord>],
    ) -> (Vec<SelectedTrack>, Vec<SelectedCluster>) {
        (
            select_tracks(tracks, 0.15),
            select_clusters(clusters, &Vector3::zeros(), 0.15),
        )
    }

    fn matcher() -> TrackClusterMatcher {
        TrackClusterMatcher::from_config(&HadCorrConfig::default())
    }

    #[test]
    fn test_selection_skips_null_low_pt_and_out_of_acceptance() {
        let mut outside = track_record(0.0, 0.0, 1.0);
        outside.in_acceptance = false;
        let tracks = vec![
            Some(track_record(0.0, 0.0, 1.0)),
            None,
            Some(track_record(0.0, 0.0, 0.1)),
            Some(outside),
            Some(track_record(0.0, 0.0, 0.15)),
        ];
        let mut foreign = cluster_record(0.0, 0.0, 1.0);
        foreign.in_acceptance = false;
        let clusters = vec![None, Some(cluster_record(0.0, 0.0, 0.1)), Some(foreign), Some(cluster_record(0.0, 0.0, 1.0))];

        let (t, c) = select(&tracks, &clusters);
        assert_eq!(t.iter().map(|t| t.index).collect::<Vec<_>>(), vec![0, 4]);
        assert_eq!(c.iter().map(|c| c.index).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_forward_nearest_and_count() {
        let tracks = vec![
            Some(track_record(0.01, 0.0, 1.0)),  // inside window
            Some(track_record(0.0, 0.002, 2.0)), // inside, closest
            Some(track_record(0.2, 0.0, 3.0)),   // outside
        ];
        let clusters = vec![Some(cluster_record(0.0, 0.0, 5.0))];
        let (t, c) = select(&tracks, &clusters);

        let result = matcher().match_cluster(&c[0], &t, None, |_, _| {});
        let nearest = result.nearest.unwrap();
        assert_eq!(nearest.index, 1);
        assert_relative_eq!(nearest.offset.dphi, 0.002, epsilon = 1e-9);
        assert_eq!(result.n_matches, 2);
        assert_relative_eq!(result.total_p, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_forward_nearest_recorded_outside_window() {
        let tracks = vec![Some(track_record(0.5, 0.0, 1.0))];
        let clusters = vec![Some(cluster_record(0.0, 0.0, 5.0))];
        let (t, c) = select(&tracks, &clusters);

        let m = matcher();
        let result = m.match_cluster(&c[0], &t, None, |_, _| {});
        assert_eq!(result.nearest.map(|n| n.index), Some(0));
        assert_eq!(result.n_matches, 0);
        assert_eq!(result.total_p, 0.0);
        assert!(!m.nearest_in_window(&result));
        let (dphi, deta) = result.track_distance();
        assert_relative_eq!(deta, 0.5, epsilon = 1e-9);
        assert_relative_eq!(dphi, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_forward_without_tracks_reports_sentinel() {
        let clusters = vec![Some(cluster_record(0.0, 0.0, 5.0))];
        let (t, c) = select(&[], &clusters);

        let result = matcher().match_cluster(&c[0], &t, None, |_, _| {});
        assert!(result.nearest.is_none());
        assert_eq!(result.track_distance(), (UNMATCHED_DISTANCE, UNMATCHED_DISTANCE));
    }

    #[test]
    fn test_tie_prefers_earlier_track() {
        let tracks = vec![
            Some(track_record(0.01, 0.0, 1.0)),
            Some(track_record(0.01, 0.0, 2.0)),
        ];
        let clusters = vec![Some(cluster_record(0.0, 0.0, 5.0))];
        let (t, c) = select(&tracks, &clusters);

        let result = matcher().match_cluster(&c[0], &t, None, |_, _| {});
        assert_eq!(result.nearest.unwrap().index, 0);
    }

    #[test]
    fn test_visitor_sees_every_track() {
        let tracks = vec![
            Some(track_record(0.01, 0.0, 1.0)),
            Some(track_record(0.3, 0.3, 2.0)),
            None,
        ];
        let clusters = vec![Some(cluster_record(0.0, 0.0, 5.0))];
        let (t, c) = select(&tracks, &clusters);

        let mut seen = Vec::new();
        matcher().match_cluster(&c[0], &t, None, |track, _| seen.push(track.index));
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_reverse_pass_fixed_window_and_prefilter() {
        // Narrow configured window must not change the reverse count
        let narrow = TrackClusterMatcher::new(MatchingWindow { phi: 0.001, eta: 0.001 });
        let tracks = vec![Some(track_record(0.0, 0.0, 1.0))];
        let clusters = vec![
            Some(cluster_record(0.02, 0.0, 3.0)),
            Some(cluster_record(0.01, 0.04, 3.0)),
            Some(cluster_record(0.0, 0.3, 3.0)),
        ];
        let (t, c) = select(&tracks, &clusters);

        let m = narrow.match_track(&t[0], &c);
        assert_eq!(m.track_index, 0);
        assert_eq!(m.nearest_cluster, Some(0));
        assert_eq!(m.n_matches, 2);
    }

    #[test]
    fn test_reverse_pass_rejects_far_candidates() {
        let track = SelectedTrack {
            index: 0,
            track: Track::from(&TrackRecord::new([1.0, 0.0, 0.0], 1, 30.0, 0.0)),
        };
        let clusters = vec![Some(cluster_record(0.0, 0.0, 3.0))];
        let (_, c) = select(&[], &clusters);

        let m = matcher().match_track(&track, &c);
        assert_eq!(m.nearest_cluster, None);
        assert_eq!(m.n_matches, 0);
    }

    #[test]
    fn test_mutual_gate_blocks_foreign_tracks() {
        // Two clusters close together; the track is nearest to cluster 1
        let tracks = vec![Some(track_record(0.012, 0.0, 1.0))];
        let clusters = vec![
            Some(cluster_record(0.0, 0.0, 5.0)),
            Some(cluster_record(0.02, 0.0, 5.0)),
        ];
        let (t, c) = select(&tracks, &clusters);
        let m = matcher();

        let reverse = m.match_tracks(&t, &c);
        let assoc = TrackAssociations::from_matches(tracks.len(), &reverse);
        assert_eq!(assoc.get(0), Some(1));

        // Without the gate both clusters count the track
        assert_eq!(m.match_cluster(&c[0], &t, None, |_, _| {}).n_matches, 1);
        assert_eq!(m.match_cluster(&c[1], &t, None, |_, _| {}).n_matches, 1);

        // With the gate only the associated cluster does
        assert_eq!(m.match_cluster(&c[0], &t, Some(&assoc), |_, _| {}).n_matches, 0);
        assert_eq!(m.match_cluster(&c[1], &t, Some(&assoc), |_, _| {}).n_matches, 1);
    }

    #[test]
    fn test_associations_ignore_out_of_range_tracks() {
        let matches = [TrackMatch { track_index: 5, nearest_cluster: Some(0), n_matches: 1 }];
        let assoc = TrackAssociations::from_matches(2, &matches);
        assert_eq!(assoc.len(), 2);
        assert_eq!(assoc.get(5), None);
        assert!(!assoc.points_to(0, 0));
    }
}
