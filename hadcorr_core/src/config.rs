//! Job configuration for the hadronic correction.

use crate::error::HadCorrError;
use serde::{Deserialize, Serialize};

/// Configuration for the HadCorrProcessor.
///
/// Set before the job starts; the processor keeps its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HadCorrConfig {
    /// Name of the input track collection (default: "Tracks")
    pub tracks_name: String,
    
    /// Name of the input cluster collection (default: "CaloClusters")
    pub calo_name: String,
    
    /// Name of the corrected-cluster output collection (default: "CaloClustersCorr")
    pub out_calo_name: String,
    
    /// Matching window half-width in phi (default: 0.05)
    pub phi_match: f64,
    
    /// Matching window half-width in eta (default: 0.025)
    pub eta_match: f64,
    
    /// Run the track→cluster pass and require mutual association (default: false)
    pub do_track_clus: bool,
    
    /// Correction setting: 0 = off, (0,1] = subtract this fraction of the
    /// closest track, >1 = subtract (value - 1) × all matched tracks (default: 0)
    pub hadcorr: f64,
    
    /// Minimum pt for tracks and clusters in GeV/c (default: 0.15)
    pub min_pt: f64,
}

impl Default for HadCorrConfig {
    fn default() -> Self {
        Self {
            tracks_name: "Tracks".to_string(),
            calo_name: "CaloClusters".to_string(),
            out_calo_name: "CaloClustersCorr".to_string(),
            phi_match: 0.05,
            eta_match: 0.025,
            do_track_clus: false,
            hadcorr: 0.0,
            min_pt: 0.15,
        }
    }
}

impl HadCorrConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, HadCorrError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| HadCorrError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
    
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, HadCorrError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| HadCorrError::InvalidConfig(format!("{}: {}", path, e)))?;
        Self::from_json(&json)
    }
    
    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), HadCorrError> {
        for (field, name) in [
            ("tracks_name", &self.tracks_name),
            ("calo_name", &self.calo_name),
            ("out_calo_name", &self.out_calo_name),
        ] {
            if name.is_empty() {
                return Err(HadCorrError::InvalidConfig(format!("{} must not be empty", field)));
            }
        }
        if !(self.phi_match > 0.0) || !(self.eta_match > 0.0) {
            return Err(HadCorrError::InvalidConfig(format!(
                "matching window must be positive, got phi={} eta={}",
                self.phi_match, self.eta_match
            )));
        }
        if !(self.hadcorr >= 0.0) || !self.hadcorr.is_finite() {
            return Err(HadCorrError::InvalidConfig(format!(
                "hadcorr must be a finite value >= 0, got {}",
                self.hadcorr
            )));
        }
        if !self.min_pt.is_finite() {
            return Err(HadCorrError::InvalidConfig("min_pt must be finite".to_string()));
        }
        Ok(())
    }
    
    /// Correction policy selected by `hadcorr`.
    pub fn correction_mode(&self) -> CorrectionMode {
        CorrectionMode::from_setting(self.hadcorr)
    }
}

/// How matched track momentum is removed from a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrectionMode {
    /// Energy left untouched
    Disabled,
    /// Subtract `fraction` × p of the closest track inside the window
    SubtractClosest { fraction: f64 },
    /// Subtract `fraction` × summed p of every counted track
    SubtractAll { fraction: f64 },
}

impl CorrectionMode {
    /// Decode the single numeric `hadcorr` setting.
    pub fn from_setting(hadcorr: f64) -> Self {
        if hadcorr > 1.0 {
            CorrectionMode::SubtractAll { fraction: hadcorr - 1.0 }
        } else if hadcorr > 0.0 {
            CorrectionMode::SubtractClosest { fraction: hadcorr }
        } else {
            CorrectionMode::Disabled
        }
    }
    
    /// True for the subtract-all policy, which also fills per-track residuals.
    pub fn is_subtract_all(&self) -> bool {
        matches!(self, CorrectionMode::SubtractAll { .. })
    }
}
