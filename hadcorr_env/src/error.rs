//! Error types for the HadCorr environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Event data could not be (de)serialized
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    
    /// Underlying file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    
    /// An object with this name is already registered in the event
    #[error("Object already registered: {0}")]
    DuplicateObject(String),
}
