//! HadCorr Environment Abstraction Layer
//!
//! This crate is the boundary between the hadronic correction engine and
//! the hosting event-processing framework:
//! - **Input**: `EventSource` hands out `InputEvent`s with named track and
//!   cluster collections, centrality and primary vertex
//! - **Output**: `ObjectRegistry` receives the corrected-cluster
//!   `ClusterCollection`, registered once and refilled every event
//! - **Records**: `TrackRecord` / `CaloClusterRecord` are the external
//!   representations; the engine converts them to its own value types
//!
//! # Example
//!
//! ```ignore
//! use hadcorr_env::{EventSource, VecEventSource, EventRegistry};
//!
//! let mut source = VecEventSource::new("sample", events);
//! let mut registry = EventRegistry::new();
//! while let Some(event) = source.next_event() {
//!     processor.process_event(&event?, &mut registry);
//! }
//! ```

mod error;
mod event;
mod registry;
mod source;
mod types;

pub use error::EnvError;
pub use event::{Collection, InputEvent};
pub use registry::{ClusterCollection, EventRegistry, ObjectRegistry};
pub use source::{EventSource, JsonLinesSource, VecEventSource};
pub use types::{CaloClusterRecord, EventModel, TrackRecord, AMBIGUOUS_CHARGE, NO_MATCH, UNMATCHED_DISTANCE};
