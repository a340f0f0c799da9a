//! Error types for the hadronic correction engine.

use hadcorr_env::EnvError;
use thiserror::Error;

/// Errors raised by the engine.
///
/// Everything except `InvalidConfig` is fatal for a single event only: the
/// event is logged and skipped, the job continues.
#[derive(Debug, Error)]
pub enum HadCorrError {
    #[error("Centrality negative: {0}")]
    NegativeCentrality(f64),
    
    #[error("Collection not found: {0}")]
    MissingCollection(String),
    
    #[error("Collection {0} has the wrong type")]
    WrongCollectionType(String),
    
    #[error("Event model not recognized: {0}")]
    UnrecognizedEventModel(String),
    
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    
    #[error("Environment error: {0}")]
    Env(#[from] EnvError),
}
