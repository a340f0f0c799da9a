//! HadCorr Processor - Per-event driver of the hadronic correction.
//!
//! Connects the pure engines (matching, correction, accumulation) to the
//! environment: it reads the named input collections of an `InputEvent`,
//! publishes the corrected clusters into the job's `ObjectRegistry`, and
//! keeps the job-lifetime histograms.
//!
//! # Event flow
//!
//! ```text
//! publish prep → init → reverse pass (optional) → forward pass → publish
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hadcorr_core::{HadCorrConfig, HadCorrProcessor};
//! use hadcorr_env::EventRegistry;
//!
//! let mut processor = HadCorrProcessor::new(HadCorrConfig::default())?;
//! let mut registry = EventRegistry::new();
//! for event in events {
//!     let _ = processor.process_event(&event, &mut registry);
//! }
//! let summary = processor.finish();
//! ```

use crate::accumulator::{Accumulator, HistogramSet};
use crate::binning::{centrality_bin, ChargeClass};
use crate::config::{CorrectionMode, HadCorrConfig};
use crate::correction::{ClosestTrack, Correction, Corrector};
use crate::error::HadCorrError;
use crate::histogram::{HistogramError, HistogramList};
use crate::matching::{
    select_clusters, select_tracks, MatchResult, SelectedTrack, TrackAssociations, TrackClusterMatcher, TrackMatch,
};
use hadcorr_env::{
    CaloClusterRecord, ClusterCollection, Collection, EventModel, InputEvent, ObjectRegistry, TrackRecord, NO_MATCH,
};
use nalgebra::Vector3;
use serde::Serialize;
use tracing::{debug, error, info};

/// Centrality assumed when the event carries none.
pub const DEFAULT_CENTRALITY: f64 = 99.0;

// ============================================================================
// RESULTS
// ============================================================================

/// Match and correction of one processed cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOutcome {
    /// Slot index in the input cluster collection
    pub cluster_index: usize,
    pub result: MatchResult,
    pub correction: Correction,
}

/// Everything the processor decided for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventOutcome {
    pub event_number: u64,
    pub centrality: f64,
    /// One entry per cluster that passed selection, in input order
    pub clusters: Vec<ClusterOutcome>,
    /// Reverse-pass results; empty when the reverse pass is disabled
    pub track_matches: Vec<TrackMatch>,
    tracks_name: String,
    calo_name: String,
}

impl EventOutcome {
    /// Clusters that passed selection.
    pub fn n_processed(&self) -> usize {
        self.clusters.len()
    }

    /// Clusters published with positive corrected energy.
    pub fn n_emitted(&self) -> usize {
        self.clusters.iter().filter(|c| c.correction.emitted()).count()
    }

    /// Write the match results back onto the input records.
    ///
    /// Processed clusters get their nearest-track index and offsets, tracks
    /// scanned by the reverse pass get their cluster association. Records
    /// that were not processed are left untouched.
    pub fn apply_to(&self, event: &mut InputEvent) {
        if let Some(clusters) = event.clusters_mut(&self.calo_name) {
            for outcome in &self.clusters {
                if let Some(Some(record)) = clusters.get_mut(outcome.cluster_index) {
                    write_cluster_match(record, &outcome.result);
                }
            }
        }
        if let Some(tracks) = event.tracks_mut(&self.tracks_name) {
            for m in &self.track_matches {
                if let Some(Some(record)) = tracks.get_mut(m.track_index) {
                    record.calo_cluster = m.nearest_cluster.map_or(NO_MATCH, |i| i as i32);
                }
            }
        }
    }
}

fn write_cluster_match(record: &mut CaloClusterRecord, result: &MatchResult) {
    record.nearest_track = result.nearest.map_or(NO_MATCH, |n| n.index as i32);
    let (dphi, deta) = result.track_distance();
    record.track_dphi = dphi;
    record.track_deta = deta;
}

/// Histograms and counters of a processor, before the final flattening.
///
/// Partial results of several workers are combined with `merge`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResult {
    pub histograms: HistogramSet,
    pub events_processed: u64,
    pub events_skipped: u64,
}

impl PartialResult {
    pub fn merge(&mut self, other: &PartialResult) -> Result<(), HistogramError> {
        self.histograms.merge(&other.histograms)?;
        self.events_processed += other.events_processed;
        self.events_skipped += other.events_skipped;
        Ok(())
    }

    pub fn into_summary(self) -> JobSummary {
        JobSummary {
            histograms: self.histograms.into_list(),
            events_processed: self.events_processed,
            events_skipped: self.events_skipped,
        }
    }
}

/// Final output of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub histograms: HistogramList,
    pub events_processed: u64,
    pub events_skipped: u64,
}

// ============================================================================
// PROCESSOR
// ============================================================================

/// Per-event driver owning the job-lifetime state.
///
/// Single-threaded: the output collection is shared with the registry
/// through a non-atomic handle. Run one processor per worker.
pub struct HadCorrProcessor {
    config: HadCorrConfig,
    matcher: TrackClusterMatcher,
    corrector: Corrector,
    accumulator: Accumulator,
    output: ClusterCollection,
    events_processed: u64,
    events_skipped: u64,
}

impl HadCorrProcessor {
    /// Create a processor for one job.
    pub fn new(config: HadCorrConfig) -> Result<Self, HadCorrError> {
        config.validate()?;
        let mode = config.correction_mode();
        debug!(
            "HadCorr processor: {} + {} -> {} ({:?}, track-clus={})",
            config.tracks_name, config.calo_name, config.out_calo_name, mode, config.do_track_clus
        );
        Ok(Self {
            matcher: TrackClusterMatcher::from_config(&config),
            corrector: Corrector::new(mode),
            accumulator: Accumulator::new(),
            output: ClusterCollection::new(config.out_calo_name.clone()),
            events_processed: 0,
            events_skipped: 0,
            config,
        })
    }

    pub fn config(&self) -> &HadCorrConfig {
        &self.config
    }

    /// Handle to the corrected-cluster collection of the current event.
    pub fn output(&self) -> &ClusterCollection {
        &self.output
    }

    pub fn histograms(&self) -> &HistogramSet {
        self.accumulator.histograms()
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn events_skipped(&self) -> u64 {
        self.events_skipped
    }

    /// Process one event.
    ///
    /// Errors are fatal for this event only: they are logged, counted and
    /// returned, and the processor stays usable for the next event.
    pub fn process_event<R: ObjectRegistry>(
        &mut self,
        event: &InputEvent,
        registry: &mut R,
    ) -> Result<EventOutcome, HadCorrError> {
        match self.run_event(event, registry) {
            Ok(outcome) => {
                self.events_processed += 1;
                debug!(
                    "Event {}: cent={:.1}, {} clusters processed, {} emitted",
                    event.number,
                    outcome.centrality,
                    outcome.n_processed(),
                    outcome.n_emitted()
                );
                Ok(outcome)
            }
            Err(e) => {
                self.events_skipped += 1;
                error!("Event {} skipped: {}", event.number, e);
                Err(e)
            }
        }
    }

    /// End the job and hand out its histograms and counters.
    pub fn finish(self) -> JobSummary {
        self.into_partial().into_summary()
    }

    /// End the job without flattening, for merging with other workers.
    pub fn into_partial(self) -> PartialResult {
        PartialResult {
            histograms: self.accumulator.into_histograms(),
            events_processed: self.events_processed,
            events_skipped: self.events_skipped,
        }
    }

    // ========================================================================
    // EVENT STAGES
    // ========================================================================

    fn run_event<R: ObjectRegistry>(&mut self, event: &InputEvent, registry: &mut R) -> Result<EventOutcome, HadCorrError> {
        // Publish prep
        if !registry.find_object(self.output.name()) {
            registry.add_object(self.output.clone())?;
            info!("Registered output collection {}", self.output.name());
        }
        self.output.clear();

        // Init
        if let EventModel::Other(name) = &event.model {
            return Err(HadCorrError::UnrecognizedEventModel(name.clone()));
        }
        let cent = event.centrality.unwrap_or(DEFAULT_CENTRALITY);
        if cent < 0.0 {
            return Err(HadCorrError::NegativeCentrality(cent));
        }
        let track_records = self.tracks(event)?;
        let cluster_records = self.clusters(event)?;
        self.accumulator.record_event(cent);

        let cent_bin = centrality_bin(cent);
        let vertex = Vector3::from(event.vertex);
        let tracks = select_tracks(track_records, self.config.min_pt);
        let clusters = select_clusters(cluster_records, &vertex, self.config.min_pt);

        // Reverse pass
        let (track_matches, associations) = if self.config.do_track_clus {
            let matches = self.matcher.match_tracks(&tracks, &clusters);
            for m in &matches {
                self.accumulator.record_track_matches(cent, m.n_matches);
            }
            let associations = TrackAssociations::from_matches(track_records.len(), &matches);
            (matches, Some(associations))
        } else {
            (Vec::new(), None)
        };

        // Forward pass
        let mode = self.corrector.mode();
        let residual_bin = cent_bin.filter(|_| mode.is_subtract_all());
        let mut outcomes = Vec::with_capacity(clusters.len());
        let mut corrected = Vec::new();

        for cluster in &clusters {
            let energy = cluster.energy();
            let accumulator = &mut self.accumulator;
            let result = self
                .matcher
                .match_cluster(cluster, &tracks, associations.as_ref(), |candidate, offset| {
                    if let Some(cb) = residual_bin {
                        let charge = ChargeClass::from_raw(candidate.track.charge);
                        accumulator.record_residual(cb, charge, candidate.track.p(), offset, energy);
                    }
                });

            self.accumulator.record_cluster(cent, energy, result.n_matches);

            let mut closest = None;
            if let (CorrectionMode::SubtractClosest { .. }, Some(nearest)) = (mode, result.nearest) {
                if let Some(track) = find_track(&tracks, nearest.index) {
                    let p = track.track.p();
                    let charge = ChargeClass::from_raw(track.track.charge);
                    self.accumulator
                        .record_closest(cent, cent_bin, charge, p, &nearest.offset, nearest.dr, energy);
                    closest = Some(ClosestTrack {
                        p,
                        eligible: self.matcher.nearest_in_window(&result)
                            && TrackClusterMatcher::gate_passes(associations.as_ref(), nearest.index, cluster.index),
                    });
                }
            }

            let correction = self.corrector.apply(energy, &result, closest);

            if let Some(esub) = correction.capped_subtraction {
                self.accumulator
                    .record_subtract_all(cent, cent_bin, energy, result.total_p, result.n_matches, esub);
            }
            self.accumulator.record_corrected(cent, correction.energy_after);

            if correction.emitted() {
                if let Some(Some(record)) = cluster_records.get(cluster.index) {
                    let mut copy = record.clone();
                    write_cluster_match(&mut copy, &result);
                    copy.energy = correction.energy_after;
                    corrected.push(copy);
                }
            }

            outcomes.push(ClusterOutcome {
                cluster_index: cluster.index,
                result,
                correction,
            });
        }

        // Publish
        for copy in corrected {
            self.output.push(copy);
        }

        Ok(EventOutcome {
            event_number: event.number,
            centrality: cent,
            clusters: outcomes,
            track_matches,
            tracks_name: self.config.tracks_name.clone(),
            calo_name: self.config.calo_name.clone(),
        })
    }

    fn tracks<'a>(&self, event: &'a InputEvent) -> Result<&'a [Option<TrackRecord>], HadCorrError> {
        let name = &self.config.tracks_name;
        match event.collection(name) {
            Some(Collection::Tracks(tracks)) => Ok(tracks.as_slice()),
            Some(_) => Err(HadCorrError::WrongCollectionType(name.clone())),
            None => Err(HadCorrError::MissingCollection(name.clone())),
        }
    }

    fn clusters<'a>(&self, event: &'a InputEvent) -> Result<&'a [Option<CaloClusterRecord>], HadCorrError> {
        let name = &self.config.calo_name;
        match event.collection(name) {
            Some(Collection::Clusters(clusters)) => Ok(clusters.as_slice()),
            Some(_) => Err(HadCorrError::WrongCollectionType(name.clone())),
            None => Err(HadCorrError::MissingCollection(name.clone())),
        }
    }
}

/// Selected tracks are ordered by slot index.
fn find_track(tracks: &[SelectedTrack], index: usize) -> Option<&SelectedTrack> {
    tracks
        .binary_search_by_key(&index, |t| t.index)
        .ok()
        .map(|pos| &tracks[pos])
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hadcorr_env::{EventRegistry, UNMATCHED_DISTANCE};

    /// Cluster on the x axis: eta = 0, phi = 0, pt = energy.
    fn cluster(energy: f64) -> Option<CaloClusterRecord> {
        Some(CaloClusterRecord::new(energy, [440.0, 0.0, 0.0]))
    }

    /// Track with |p| = pt = `p`, projected at (eta, phi).
    fn track(p: f64, charge: i16, eta: f64, phi: f64) -> Option<TrackRecord> {
        Some(TrackRecord::new([p, 0.0, 0.0], charge, eta, phi))
    }

    fn event(tracks: Vec<Option<TrackRecord>>, clusters: Vec<Option<CaloClusterRecord>>) -> InputEvent {
        InputEvent::new(1, EventModel::Esd)
            .with_centrality(5.0)
            .with_tracks("Tracks", tracks)
            .with_clusters("CaloClusters", clusters)
    }

    fn processor(hadcorr: f64, do_track_clus: bool) -> HadCorrProcessor {
        HadCorrProcessor::new(HadCorrConfig {
            hadcorr,
            do_track_clus,
            ..HadCorrConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_scenario_subtract_closest() {
        let mut engine = processor(1.0, false);
        let mut registry = EventRegistry::new();
        let ev = event(vec![track(1.0, 1, 0.0, 0.0)], vec![cluster(2.0)]);

        let outcome = engine.process_event(&ev, &mut registry).unwrap();
        assert_eq!(outcome.n_processed(), 1);
        assert_eq!(outcome.n_emitted(), 1);

        let out = registry.get("CaloClustersCorr").unwrap().snapshot();
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].energy, 1.0, epsilon = 1e-12);
        assert_eq!(out[0].nearest_track, 0);
    }

    #[test]
    fn test_scenario_subtract_all() {
        let mut engine = processor(2.0, false);
        let mut registry = EventRegistry::new();
        let ev = event(vec![track(1.0, 1, 0.0, 0.0)], vec![cluster(2.0)]);

        let outcome = engine.process_event(&ev, &mut registry).unwrap();
        let c = outcome.clusters[0].correction;
        assert_relative_eq!(c.capped_subtraction.unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(c.energy_after, 1.0, epsilon = 1e-12);
        assert_eq!(engine.output().len(), 1);

        let set = engine.histograms();
        assert_eq!(set.esub_pch[0][0].entries(), 1);
        assert_eq!(set.match_eta_phi[0][2].entries(), 1);
    }

    #[test]
    fn test_scenario_floor_drops_cluster() {
        let mut engine = processor(2.0, false);
        let mut registry = EventRegistry::new();
        let ev = event(vec![track(1.0, 1, 0.0, 0.0)], vec![cluster(0.5)]);

        let outcome = engine.process_event(&ev, &mut registry).unwrap();
        assert_eq!(outcome.n_processed(), 1);
        assert_eq!(outcome.n_emitted(), 0);
        assert_eq!(outcome.clusters[0].correction.energy_after, 0.0);
        assert!(engine.output().is_empty());
        assert_relative_eq!(engine.histograms().e_after.integral(), 0.0);
    }

    #[test]
    fn test_scenario_negative_centrality() {
        let mut engine = processor(1.0, false);
        let mut registry = EventRegistry::new();
        let ev = event(vec![track(1.0, 1, 0.0, 0.0)], vec![cluster(2.0)]).with_centrality(-1.0);

        let err = engine.process_event(&ev, &mut registry).unwrap_err();
        assert!(matches!(err, HadCorrError::NegativeCentrality(_)));
        assert_eq!(engine.events_skipped(), 1);

        let list = engine.finish().histograms;
        assert!(list.histograms.iter().all(|h| h.entries() == 0));
    }

    #[test]
    fn test_missing_centrality_defaults() {
        let mut engine = processor(0.0, false);
        let mut registry = EventRegistry::new();
        let mut ev = event(vec![], vec![cluster(2.0)]);
        ev.centrality = None;

        let outcome = engine.process_event(&ev, &mut registry).unwrap();
        assert_eq!(outcome.centrality, DEFAULT_CENTRALITY);
        assert_eq!(engine.histograms().centrality.content_at(99.0), 1.0);
    }

    #[test]
    fn test_collection_errors() {
        let mut engine = processor(0.0, false);
        let mut registry = EventRegistry::new();

        let ev = InputEvent::new(1, EventModel::Aod).with_clusters("CaloClusters", vec![]);
        let err = engine.process_event(&ev, &mut registry).unwrap_err();
        assert!(matches!(err, HadCorrError::MissingCollection(ref n) if n == "Tracks"));

        let ev = InputEvent::new(2, EventModel::Aod)
            .with_tracks("Tracks", vec![])
            .with_tracks("CaloClusters", vec![]);
        let err = engine.process_event(&ev, &mut registry).unwrap_err();
        assert!(matches!(err, HadCorrError::WrongCollectionType(ref n) if n == "CaloClusters"));

        let ev = event(vec![], vec![]);
        let ev = InputEvent { model: EventModel::Other("MC".into()), ..ev };
        let err = engine.process_event(&ev, &mut registry).unwrap_err();
        assert!(matches!(err, HadCorrError::UnrecognizedEventModel(_)));

        assert_eq!(engine.events_skipped(), 3);
        assert_eq!(engine.histograms().centrality.entries(), 0);
    }

    #[test]
    fn test_registration_once_and_cleared() {
        let mut engine = processor(0.0, false);
        let mut registry = EventRegistry::new();

        engine.process_event(&event(vec![], vec![cluster(1.0), cluster(2.0)]), &mut registry)
            .unwrap();
        assert_eq!(registry.get("CaloClustersCorr").unwrap().len(), 2);

        engine.process_event(&event(vec![], vec![cluster(3.0)]), &mut registry)
            .unwrap();
        assert_eq!(registry.registrations(), 1);

        let out = registry.get("CaloClustersCorr").unwrap();
        assert!(out.same_storage(engine.output()));
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out.snapshot()[0].energy, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_null_slots_and_selection_skipped() {
        let mut engine = processor(1.0, false);
        let mut registry = EventRegistry::new();
        let mut outside = CaloClusterRecord::new(5.0, [440.0, 0.0, 0.0]);
        outside.in_acceptance = false;
        let ev = event(
            vec![None, track(0.1, 1, 0.0, 0.0), track(1.0, -1, 0.0, 0.0)],
            vec![None, Some(outside), cluster(0.1), cluster(2.0)],
        );

        let outcome = engine.process_event(&ev, &mut registry).unwrap();
        assert_eq!(outcome.n_processed(), 1);
        assert_eq!(outcome.clusters[0].cluster_index, 3);
        assert_eq!(outcome.clusters[0].result.nearest.unwrap().index, 2);
        // Negative track, closest mode: charge-shifted residual map
        assert_eq!(engine.histograms().match_eta_phi[4][2].entries(), 1);
    }

    #[test]
    fn test_closest_outside_window_not_subtracted() {
        let mut engine = processor(1.0, false);
        let mut registry = EventRegistry::new();
        let ev = event(vec![track(1.0, 1, 0.0, 0.1)], vec![cluster(2.0)]);

        let outcome = engine.process_event(&ev, &mut registry).unwrap();
        let c = &outcome.clusters[0];
        assert!(c.result.nearest.is_some());
        assert_eq!(c.result.n_matches, 0);
        assert_relative_eq!(c.correction.energy_after, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reverse_pass_gates_forward_counting() {
        let mut engine = processor(2.0, true);
        let mut registry = EventRegistry::new();
        // Both clusters sit at the same place; the track associates with the first
        let ev = event(vec![track(1.0, 1, 0.0, 0.0)], vec![cluster(2.0), cluster(3.0)]);

        let outcome = engine.process_event(&ev, &mut registry).unwrap();
        assert_eq!(outcome.track_matches.len(), 1);
        assert_eq!(outcome.track_matches[0].nearest_cluster, Some(0));
        assert_eq!(outcome.track_matches[0].n_matches, 2);

        assert_eq!(outcome.clusters[0].result.n_matches, 1);
        assert_eq!(outcome.clusters[1].result.n_matches, 0);
        assert_relative_eq!(outcome.clusters[0].correction.energy_after, 1.0, epsilon = 1e-12);
        assert_relative_eq!(outcome.clusters[1].correction.energy_after, 3.0, epsilon = 1e-12);

        let set = engine.histograms();
        assert_eq!(set.n_matches_cent_trk.content_at(5.0, 2.0), 1.0);
    }

    #[test]
    fn test_closest_track_owned_by_other_cluster_not_subtracted() {
        // Track lies inside cluster 0's window but its own nearest cluster is cluster 1
        let clusters = vec![
            cluster(2.0),
            Some(CaloClusterRecord::new(3.0, [440.0 * 0.05f64.cos(), 440.0 * 0.05f64.sin(), 0.0])),
        ];
        let ev = event(vec![track(1.0, 1, 0.0, 0.04)], clusters);

        let mut gated = processor(1.0, true);
        let outcome = gated.process_event(&ev, &mut EventRegistry::new()).unwrap();
        assert_eq!(outcome.track_matches[0].nearest_cluster, Some(1));
        assert_eq!(outcome.clusters[0].result.nearest.map(|n| n.index), Some(0));
        assert_relative_eq!(outcome.clusters[0].correction.energy_after, 2.0, epsilon = 1e-12);
        assert_relative_eq!(outcome.clusters[1].correction.energy_after, 2.0, epsilon = 1e-12);

        let mut ungated = processor(1.0, false);
        let outcome = ungated.process_event(&ev, &mut EventRegistry::new()).unwrap();
        assert_relative_eq!(outcome.clusters[0].correction.energy_after, 1.0, epsilon = 1e-12);
        assert_relative_eq!(outcome.clusters[1].correction.energy_after, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_centrality_above_range_fills_only_eop_cent() {
        let mut engine = processor(2.0, false);
        let mut registry = EventRegistry::new();
        let ev = InputEvent::new(1, EventModel::Esd)
            .with_centrality(150.0)
            .with_tracks("Tracks", vec![track(1.0, 1, 0.0, 0.0)])
            .with_clusters("CaloClusters", vec![cluster(2.0)]);

        let outcome = engine.process_event(&ev, &mut registry).unwrap();
        assert_relative_eq!(outcome.clusters[0].correction.energy_after, 1.0, epsilon = 1e-12);

        let set = engine.histograms();
        assert_eq!(set.eop_cent.entries(), 1);
        assert!(set.match_e_vs_p.iter().all(|h| h.entries() == 0));
        assert!(set.esub_pch.iter().flatten().all(|h| h.entries() == 0));
        assert!(set.match_eta_phi.iter().flatten().all(|h| h.entries() == 0));
    }

    #[test]
    fn test_apply_to_writes_back() {
        let mut engine = processor(0.0, true);
        let mut registry = EventRegistry::new();
        let mut ev = event(
            vec![track(1.0, 1, 0.01, 0.02)],
            vec![cluster(2.0), Some(CaloClusterRecord::new(2.0, [0.0, 440.0, 0.0]))],
        );
        // Second cluster is at phi = π/2, no track near it
        let outcome = engine.process_event(&ev, &mut registry).unwrap();
        outcome.apply_to(&mut ev);

        let Some(Collection::Clusters(clusters)) = ev.collection("CaloClusters") else {
            panic!("clusters missing");
        };
        let first = clusters[0].as_ref().unwrap();
        assert_eq!(first.nearest_track, 0);
        assert_relative_eq!(first.track_deta, 0.01, epsilon = 1e-12);
        assert_relative_eq!(first.track_dphi, 0.02, epsilon = 1e-12);
        // Nearest offsets are reported regardless of the window
        let second = clusters[1].as_ref().unwrap();
        assert_eq!(second.nearest_track, 0);
        assert!(second.track_dphi < 0.0);

        let Some(Collection::Tracks(tracks)) = ev.collection("Tracks") else {
            panic!("tracks missing");
        };
        assert_eq!(tracks[0].as_ref().unwrap().calo_cluster, 0);
    }

    #[test]
    fn test_apply_to_without_tracks_uses_sentinel() {
        let mut engine = processor(0.0, false);
        let mut registry = EventRegistry::new();
        let mut ev = event(vec![], vec![cluster(2.0)]);

        let outcome = engine.process_event(&ev, &mut registry).unwrap();
        outcome.apply_to(&mut ev);

        let record = ev.clusters_mut("CaloClusters").unwrap()[0].clone().unwrap();
        assert_eq!(record.nearest_track, NO_MATCH);
        assert_eq!(record.track_dphi, UNMATCHED_DISTANCE);
        assert_eq!(record.track_deta, UNMATCHED_DISTANCE);
    }

    #[test]
    fn test_partial_merge_and_finish() {
        let mut a = processor(0.0, false);
        let mut b = processor(0.0, false);
        let mut ra = EventRegistry::new();
        let mut rb = EventRegistry::new();
        a.process_event(&event(vec![], vec![cluster(1.0)]), &mut ra).unwrap();
        b.process_event(&event(vec![], vec![cluster(1.0)]), &mut rb).unwrap();
        let _ = b.process_event(&event(vec![], vec![]).with_centrality(-5.0), &mut rb);

        let mut partial = a.into_partial();
        partial.merge(&b.into_partial()).unwrap();
        let summary = partial.into_summary();
        assert_eq!(summary.events_processed, 2);
        assert_eq!(summary.events_skipped, 1);
        assert_eq!(summary.histograms.h1("Centrality").unwrap().entries(), 2);
        assert_relative_eq!(summary.histograms.h1("Ebefore").unwrap().integral(), 2.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = HadCorrConfig {
            phi_match: 0.0,
            ..HadCorrConfig::default()
        };
        assert!(matches!(HadCorrProcessor::new(config), Err(HadCorrError::InvalidConfig(_))));
    }
}
