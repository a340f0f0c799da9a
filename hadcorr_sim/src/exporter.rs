//! JSON exporter for job results.
//!
//! Writes the final histogram list with the run metadata, for plotting and
//! comparisons outside this crate.

use crate::runner::ScenarioResult;
use hadcorr_core::{HadCorrConfig, Histogram, HistogramList};
use serde::Serialize;
use std::fs::File;
use std::io::Write;

/// Complete job export.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Correction setting the job ran with
    pub hadcorr: f64,

    /// Reverse pass enabled
    pub do_track_clus: bool,

    pub events_processed: u64,
    pub events_skipped: u64,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// All histograms, in output-list order
    pub histograms: HistogramList,
}

impl HistogramExport {
    /// Builds an export from a finished scenario run.
    pub fn from_result(result: &ScenarioResult, config: &HadCorrConfig) -> Self {
        Self {
            scenario: result.scenario.name().to_string(),
            seed: result.seed,
            hadcorr: result.scenario.hadcorr().unwrap_or(config.hadcorr),
            do_track_clus: config.do_track_clus,
            events_processed: result.summary.events_processed,
            events_skipped: result.summary.events_skipped,
            passed: result.passed,
            failure_reason: result.failure_reason.clone(),
            histograms: result.summary.histograms.clone(),
        }
    }

    /// Histograms with at least one entry.
    pub fn filled(&self) -> impl Iterator<Item = &Histogram> {
        self.histograms.histograms.iter().filter(|h| h.entries() > 0)
    }

    /// Compact summary without bin contents, for console output.
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "scenario": self.scenario,
            "seed": self.seed,
            "hadcorr": self.hadcorr,
            "do_track_clus": self.do_track_clus,
            "events_processed": self.events_processed,
            "events_skipped": self.events_skipped,
            "passed": self.passed,
            "failure_reason": self.failure_reason,
            "histograms": self.filled().map(|h| {
                serde_json::json!({ "name": h.name(), "entries": h.entries() })
            }).collect::<Vec<_>>(),
        })
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
