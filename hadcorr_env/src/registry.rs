//! Object registry receiving the engine's per-event output.

use crate::error::EnvError;
use crate::types::CaloClusterRecord;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A named, shared collection of cluster copies.
///
/// The producer keeps one handle and refills it every event; the registry
/// holds another, so consumers always see the current event's content.
/// Single-threaded by construction: one producer per registry.
#[derive(Debug, Clone)]
pub struct ClusterCollection {
    name: String,
    clusters: Rc<RefCell<Vec<CaloClusterRecord>>>,
}

impl ClusterCollection {
    /// Creates an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clusters: Rc::new(RefCell::new(Vec::new())),
        }
    }
    
    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }
    
    /// Removes all entries, keeping the allocation.
    pub fn clear(&self) {
        self.clusters.borrow_mut().clear();
    }
    
    /// Appends a cluster copy.
    pub fn push(&self, cluster: CaloClusterRecord) {
        self.clusters.borrow_mut().push(cluster);
    }
    
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.clusters.borrow().len()
    }
    
    /// Returns true if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.clusters.borrow().is_empty()
    }
    
    /// Copies out the current content.
    pub fn snapshot(&self) -> Vec<CaloClusterRecord> {
        self.clusters.borrow().clone()
    }
    
    /// Returns true if both handles point at the same storage.
    pub fn same_storage(&self, other: &ClusterCollection) -> bool {
        Rc::ptr_eq(&self.clusters, &other.clusters)
    }
}

/// Where produced collections are published for downstream consumers.
pub trait ObjectRegistry {
    /// Returns true if an object named `name` is registered.
    fn find_object(&self, name: &str) -> bool;
    
    /// Registers a collection under its own name.
    fn add_object(&mut self, collection: ClusterCollection) -> Result<(), EnvError>;
}

/// Job-lifetime registry backed by a map.
#[derive(Debug, Default)]
pub struct EventRegistry {
    objects: HashMap<String, ClusterCollection>,
    registrations: usize,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Returns the collection registered under `name`.
    pub fn get(&self, name: &str) -> Option<&ClusterCollection> {
        self.objects.get(name)
    }
    
    /// Total number of successful `add_object` calls.
    pub fn registrations(&self) -> usize {
        self.registrations
    }
}

impl ObjectRegistry for EventRegistry {
    fn find_object(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }
    
    fn add_object(&mut self, collection: ClusterCollection) -> Result<(), EnvError> {
        if self.objects.contains_key(collection.name()) {
            return Err(EnvError::DuplicateObject(collection.name().to_string()));
        }
        self.objects.insert(collection.name().to_string(), collection);
        self.registrations += 1;
        Ok(())
    }
}
