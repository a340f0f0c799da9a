//! Canned end-to-end scenarios.

use crate::runner::EventLog;
use hadcorr_core::HadCorrConfig;
use hadcorr_env::{CaloClusterRecord, EventModel, InputEvent, TrackRecord};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// HC-A: closest track inside the window is subtracted
    SubtractClosest,

    /// HC-B: all matched momentum is subtracted
    SubtractAll,

    /// HC-C: subtraction exceeds the cluster energy, cluster is dropped
    FloorDrop,

    /// HC-D: negative centrality aborts the event
    NegativeCentrality,

    /// Generated events
    Random,
}

/// What a canned scenario must produce.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    /// Energies of the published clusters, per event
    pub emitted_energies: Vec<Vec<f64>>,

    /// Events expected to fail
    pub skipped: usize,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SubtractClosest,
            ScenarioId::SubtractAll,
            ScenarioId::FloorDrop,
            ScenarioId::NegativeCentrality,
            ScenarioId::Random,
        ]
    }

    /// Returns the hand-built scenarios only.
    pub fn canned() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SubtractClosest,
            ScenarioId::SubtractAll,
            ScenarioId::FloorDrop,
            ScenarioId::NegativeCentrality,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SubtractClosest => "subtract_closest",
            ScenarioId::SubtractAll => "subtract_all",
            ScenarioId::FloorDrop => "floor_drop",
            ScenarioId::NegativeCentrality => "negative_centrality",
            ScenarioId::Random => "random",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SubtractClosest => "One matched track (p=1) on a 2 GeV cluster, closest mode: 1 GeV left",
            ScenarioId::SubtractAll => "One matched track (p=1) on a 2 GeV cluster, subtract-all mode: 1 GeV left",
            ScenarioId::FloorDrop => "One matched track (p=1) on a 0.5 GeV cluster, subtract-all: floored and dropped",
            ScenarioId::NegativeCentrality => "Negative centrality: event skipped, no histogram touched",
            ScenarioId::Random => "Generated events with tracks, showers and neutral clusters",
        }
    }

    /// Returns true for the hand-built scenarios.
    pub fn is_canned(&self) -> bool {
        !matches!(self, ScenarioId::Random)
    }

    /// Correction setting the scenario runs with; `None` keeps the configured one.
    pub fn hadcorr(&self) -> Option<f64> {
        match self {
            ScenarioId::SubtractClosest | ScenarioId::NegativeCentrality => Some(1.0),
            ScenarioId::SubtractAll | ScenarioId::FloorDrop => Some(2.0),
            ScenarioId::Random => None,
        }
    }

    /// Builds the scenario's events using the configured collection names.
    pub fn events(&self, config: &HadCorrConfig) -> Vec<InputEvent> {
        let (cluster_energy, centrality) = match self {
            ScenarioId::SubtractClosest | ScenarioId::SubtractAll => (2.0, 5.0),
            ScenarioId::FloorDrop => (0.5, 5.0),
            ScenarioId::NegativeCentrality => (2.0, -1.0),
            ScenarioId::Random => return Vec::new(),
        };

        // Cluster on the x axis (eta = phi = 0), track pointing right at it
        let track = TrackRecord::new([1.0, 0.0, 0.0], 1, 0.0, 0.0);
        let cluster = CaloClusterRecord::new(cluster_energy, [440.0, 0.0, 0.0]);

        vec![InputEvent::new(0, EventModel::Esd)
            .with_centrality(centrality)
            .with_tracks(&config.tracks_name, vec![Some(track)])
            .with_clusters(&config.calo_name, vec![Some(cluster)])]
    }

    /// Expected result of a canned scenario.
    pub fn expectation(&self) -> Option<Expectation> {
        let (emitted_energies, skipped) = match self {
            ScenarioId::SubtractClosest | ScenarioId::SubtractAll => (vec![vec![1.0]], 0),
            ScenarioId::FloorDrop => (vec![vec![]], 0),
            ScenarioId::NegativeCentrality => (vec![vec![]], 1),
            ScenarioId::Random => return None,
        };
        Some(Expectation {
            emitted_energies,
            skipped,
        })
    }
}

impl Expectation {
    /// Compares the per-event log of a run with the expectation.
    pub fn check(&self, log: &[EventLog]) -> Result<(), String> {
        if log.len() != self.emitted_energies.len() {
            return Err(format!("expected {} events, got {}", self.emitted_energies.len(), log.len()));
        }
        let skipped = log.iter().filter(|e| e.error.is_some()).count();
        if skipped != self.skipped {
            return Err(format!("expected {} skipped events, got {}", self.skipped, skipped));
        }
        for (event, expected) in log.iter().zip(&self.emitted_energies) {
            let got = &event.emitted_energies;
            let matches = got.len() == expected.len() && got.iter().zip(expected).all(|(g, e)| (g - e).abs() < 1e-9);
            if !matches {
                return Err(format!(
                    "event {}: expected energies {:?}, got {:?}",
                    event.event_number, expected, got
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subtract_closest" | "closest" | "a" | "hc-a" => Ok(ScenarioId::SubtractClosest),
            "subtract_all" | "all_tracks" | "b" | "hc-b" => Ok(ScenarioId::SubtractAll),
            "floor_drop" | "floor" | "c" | "hc-c" => Ok(ScenarioId::FloorDrop),
            "negative_centrality" | "negative" | "d" | "hc-d" => Ok(ScenarioId::NegativeCentrality),
            "random" | "generated" => Ok(ScenarioId::Random),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
