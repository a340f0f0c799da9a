//! Per-event input container with named collections.

use crate::types::{CaloClusterRecord, EventModel, TrackRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named collection stored in an event.
///
/// Slots are `Option`s: a `None` is a null/invalid element that consumers
/// skip without complaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Collection {
    Tracks(Vec<Option<TrackRecord>>),
    Clusters(Vec<Option<CaloClusterRecord>>),
    /// A collection of a type this crate does not model (type name only)
    Other(String),
}

impl Collection {
    /// Returns the number of slots (including null ones).
    pub fn len(&self) -> usize {
        match self {
            Collection::Tracks(v) => v.len(),
            Collection::Clusters(v) => v.len(),
            Collection::Other(_) => 0,
        }
    }
    
    /// Returns true if the collection has no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One recorded collision event as supplied by the event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputEvent {
    /// Sequential event number within the job
    pub number: u64,
    
    /// Data model of the event
    pub model: EventModel,
    
    /// Centrality percentile (0 = most central). `None` for pp-like data.
    pub centrality: Option<f64>,
    
    /// Primary vertex [x, y, z] in cm
    pub vertex: [f64; 3],
    
    /// Named collections
    pub collections: HashMap<String, Collection>,
}

impl InputEvent {
    /// Creates an empty event.
    pub fn new(number: u64, model: EventModel) -> Self {
        Self {
            number,
            model,
            centrality: None,
            vertex: [0.0; 3],
            collections: HashMap::new(),
        }
    }
    
    /// Sets the centrality percentile.
    pub fn with_centrality(mut self, centrality: f64) -> Self {
        self.centrality = Some(centrality);
        self
    }
    
    /// Sets the primary vertex.
    pub fn with_vertex(mut self, vertex: [f64; 3]) -> Self {
        self.vertex = vertex;
        self
    }
    
    /// Adds a track collection under `name`.
    pub fn with_tracks(mut self, name: &str, tracks: Vec<Option<TrackRecord>>) -> Self {
        self.collections.insert(name.to_string(), Collection::Tracks(tracks));
        self
    }
    
    /// Adds a cluster collection under `name`.
    pub fn with_clusters(mut self, name: &str, clusters: Vec<Option<CaloClusterRecord>>) -> Self {
        self.collections.insert(name.to_string(), Collection::Clusters(clusters));
        self
    }
    
    /// Looks up a collection by name.
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }
    
    /// Mutable access to a track collection, if `name` holds tracks.
    pub fn tracks_mut(&mut self, name: &str) -> Option<&mut Vec<Option<TrackRecord>>> {
        match self.collections.get_mut(name) {
            Some(Collection::Tracks(tracks)) => Some(tracks),
            _ => None,
        }
    }
    
    /// Mutable access to a cluster collection, if `name` holds clusters.
    pub fn clusters_mut(&mut self, name: &str) -> Option<&mut Vec<Option<CaloClusterRecord>>> {
        match self.collections.get_mut(name) {
            Some(Collection::Clusters(clusters)) => Some(clusters),
            _ => None,
        }
    }
}
