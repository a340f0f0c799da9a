//! Event source abstraction.

use crate::error::EnvError;
use crate::event::InputEvent;
use std::collections::VecDeque;
use std::io::BufRead;

/// Supplies events to the engine one at a time, strictly in sequence.
///
/// # Implementations
///
/// - **In-memory**: `VecEventSource`, for tests and generated samples
/// - **File**: `JsonLinesSource`, one JSON-encoded `InputEvent` per line
///
/// A `Some(Err(_))` is a broken event; the caller logs it and keeps pulling.
/// `None` means the source is exhausted.
pub trait EventSource {
    /// Returns the next event, if any.
    fn next_event(&mut self) -> Option<Result<InputEvent, EnvError>>;
    
    /// Human-readable source name (for logging).
    fn name(&self) -> &str;
}

/// Serves a pre-built list of events.
pub struct VecEventSource {
    name: String,
    events: VecDeque<InputEvent>,
}

impl VecEventSource {
    /// Creates a source over `events`.
    pub fn new(name: impl Into<String>, events: Vec<InputEvent>) -> Self {
        Self {
            name: name.into(),
            events: events.into(),
        }
    }
    
    /// Number of events not yet served.
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl EventSource for VecEventSource {
    fn next_event(&mut self) -> Option<Result<InputEvent, EnvError>> {
        self.events.pop_front().map(Ok)
    }
    
    fn name(&self) -> &str {
        &self.name
    }
}

/// Reads newline-delimited JSON events from any buffered reader.
pub struct JsonLinesSource<R: BufRead> {
    name: String,
    lines: std::io::Lines<R>,
}

impl<R: BufRead> JsonLinesSource<R> {
    /// Creates a source reading from `reader`.
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            lines: reader.lines(),
        }
    }
}

impl JsonLinesSource<std::io::BufReader<std::fs::File>> {
    /// Opens a JSON-lines event file.
    pub fn open(path: &str) -> Result<Self, EnvError> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(path, std::io::BufReader::new(file)))
    }
}

impl<R: BufRead> EventSource for JsonLinesSource<R> {
    fn next_event(&mut self) -> Option<Result<InputEvent, EnvError>> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(EnvError::from));
        }
    }
    
    fn name(&self) -> &str {
        &self.name
    }
}
