//! Scenario runner - drives the correction over canned, generated or
//! file-based events.

use crate::generator::{EventGenerator, GeneratorConfig, GeneratorError};
use crate::scenarios::ScenarioId;

use hadcorr_core::{HadCorrConfig, HadCorrError, HadCorrProcessor, HistogramError, JobSummary, PartialResult};
use hadcorr_env::{EnvError, EventRegistry, EventSource, VecEventSource};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that stop a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] HadCorrError),

    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Cannot merge worker histograms: {0}")]
    Merge(#[from] HistogramError),

    #[error("Worker thread panicked")]
    WorkerPanicked,
}

/// What happened to one event (sequential runs only).
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    pub event_number: u64,

    /// Energies of the corrected clusters published for this event
    pub emitted_energies: Vec<f64>,

    /// Reason the event was skipped
    pub error: Option<String>,
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the scenario met its expectation
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Histograms and counters of the job
    pub summary: JobSummary,
}

/// Output of a sequential run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: JobSummary,
    pub events: Vec<EventLog>,
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Master seed for generated events
    seed: u64,

    /// Correction settings
    config: HadCorrConfig,

    /// Number of generated events
    num_events: u64,

    /// Worker threads for generated events
    workers: usize,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, config: HadCorrConfig) -> Self {
        Self {
            seed,
            config,
            num_events: 1000,
            workers: 1,
        }
    }

    /// Sets the number of generated events.
    pub fn with_events(mut self, num_events: u64) -> Self {
        self.num_events = num_events;
        self
    }

    /// Sets the number of worker threads (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> Result<ScenarioResult, RunError> {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("  {}", scenario.description());

        let mut config = self.config.clone();
        if let Some(hadcorr) = scenario.hadcorr() {
            config.hadcorr = hadcorr;
        }

        match scenario.expectation() {
            Some(expectation) => {
                let mut source = VecEventSource::new(scenario.name(), scenario.events(&config));
                let report = run_source(&config, &mut source)?;
                let check = expectation.check(&report.events);
                Ok(ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: check.is_ok(),
                    failure_reason: check.err(),
                    summary: report.summary,
                })
            }
            None => {
                let generator_config = GeneratorConfig {
                    tracks_name: config.tracks_name.clone(),
                    calo_name: config.calo_name.clone(),
                    ..GeneratorConfig::default()
                };
                let generator = EventGenerator::new(self.seed, generator_config)?;
                let summary = run_generated(&config, &generator, self.num_events, self.workers)?;
                let failure_reason = check_generated(&summary, self.num_events);
                Ok(ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: failure_reason.is_none(),
                    failure_reason,
                    summary,
                })
            }
        }
    }
}

/// Processes every event of `source` in order on the calling thread.
///
/// Unreadable events are logged and counted as skipped.
pub fn run_source<S: EventSource>(config: &HadCorrConfig, source: &mut S) -> Result<RunReport, RunError> {
    let mut processor = HadCorrProcessor::new(config.clone())?;
    let mut registry = EventRegistry::new();
    let mut events = Vec::new();
    let mut unreadable = 0;

    info!("Reading events from {}", source.name());

    while let Some(next) = source.next_event() {
        let event = match next {
            Ok(event) => event,
            Err(e) => {
                warn!("Unreadable event in {}: {}", source.name(), e);
                unreadable += 1;
                continue;
            }
        };

        let log = match processor.process_event(&event, &mut registry) {
            Ok(_) => EventLog {
                event_number: event.number,
                emitted_energies: processor.output().snapshot().iter().map(|c| c.energy).collect(),
                error: None,
            },
            Err(e) => EventLog {
                event_number: event.number,
                emitted_energies: Vec::new(),
                error: Some(e.to_string()),
            },
        };
        events.push(log);
    }

    let mut summary = processor.finish();
    summary.events_skipped += unreadable;
    Ok(RunReport { summary, events })
}

/// Processes `num_events` generated events on `workers` threads.
///
/// Worker `w` handles events `w, w + workers, ...` with its own processor
/// and registry; the partial histogram sets are merged at the end.
pub fn run_generated(
    config: &HadCorrConfig,
    generator: &EventGenerator,
    num_events: u64,
    workers: usize,
) -> Result<JobSummary, RunError> {
    let workers = workers.clamp(1, num_events.max(1) as usize);

    let partials = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let config = config.clone();
                scope.spawn(move |_| -> Result<PartialResult, RunError> {
                    let mut processor = HadCorrProcessor::new(config)?;
                    let mut registry = EventRegistry::new();
                    for number in (worker as u64..num_events).step_by(workers) {
                        let event = generator.generate(number);
                        // Failures are logged and counted by the processor
                        let _ = processor.process_event(&event, &mut registry);
                    }
                    debug!(
                        "Worker {} done: {} processed, {} skipped",
                        worker,
                        processor.events_processed(),
                        processor.events_skipped()
                    );
                    Ok(processor.into_partial())
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| RunError::WorkerPanicked).and_then(|r| r))
            .collect::<Result<Vec<_>, RunError>>()
    })
    .map_err(|_| RunError::WorkerPanicked)??;

    let mut partials = partials.into_iter();
    let Some(mut total) = partials.next() else {
        return Ok(HadCorrProcessor::new(config.clone())?.finish());
    };
    for partial in partials {
        total.merge(&partial)?;
    }

    info!(
        "Merged {} worker(s): {} events processed, {} skipped",
        workers, total.events_processed, total.events_skipped
    );
    Ok(total.into_summary())
}

/// Sanity checks on a generated run; `None` if everything holds.
fn check_generated(summary: &JobSummary, num_events: u64) -> Option<String> {
    if summary.events_processed + summary.events_skipped != num_events {
        return Some(format!(
            "{} events accounted for, {} generated",
            summary.events_processed + summary.events_skipped,
            num_events
        ));
    }
    if summary.events_skipped > 0 {
        return Some(format!("{} generated events were skipped", summary.events_skipped));
    }
    if let Some(e_after) = summary.histograms.h1("Eafter") {
        if e_after.underflow() != 0.0 {
            return Some("corrected energy below zero".to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hadcorr_env::JsonLinesSource;
    use std::io::Cursor;

    #[test]
    fn test_canned_scenarios_pass() {
        let runner = ScenarioRunner::new(42, HadCorrConfig::default());
        for scenario in ScenarioId::canned() {
            let result = runner.run(scenario).unwrap();
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
        }
    }

    #[test]
    fn test_negative_centrality_leaves_histograms_empty() {
        let runner = ScenarioRunner::new(42, HadCorrConfig::default());
        let result = runner.run(ScenarioId::NegativeCentrality).unwrap();
        assert_eq!(result.summary.events_skipped, 1);
        assert!(result.summary.histograms.histograms.iter().all(|h| h.entries() == 0));
    }

    #[test]
    fn test_random_scenario_passes() {
        let runner = ScenarioRunner::new(5, HadCorrConfig::default()).with_events(50);
        let result = runner.run(ScenarioId::Random).unwrap();
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.summary.events_processed, 50);
    }

    #[test]
    fn test_workers_merge_like_single_thread() {
        let config = HadCorrConfig {
            hadcorr: 1.7,
            do_track_clus: true,
            ..HadCorrConfig::default()
        };
        let generator = EventGenerator::new(9, GeneratorConfig::default()).unwrap();

        let single = run_generated(&config, &generator, 40, 1).unwrap();
        let multi = run_generated(&config, &generator, 40, 4).unwrap();

        assert_eq!(single.events_processed, multi.events_processed);
        assert_eq!(single.histograms.len(), multi.histograms.len());
        for (a, b) in single.histograms.histograms.iter().zip(&multi.histograms.histograms) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.entries(), b.entries(), "{}", a.name());
        }
        let (ea, eb) = (
            single.histograms.h1("Eafter").unwrap(),
            multi.histograms.h1("Eafter").unwrap(),
        );
        assert_relative_eq!(ea.integral(), eb.integral(), max_relative = 1e-9);
    }

    #[test]
    fn test_run_source_counts_unreadable() {
        let config = HadCorrConfig::default();
        let event = ScenarioId::SubtractClosest.events(&config).remove(0);
        let line = serde_json::to_string(&event).unwrap();
        let input = format!("{}\nnot json\n\n{}\n", line, line);
        let mut source = JsonLinesSource::new("mem", Cursor::new(input));

        let report = run_source(&config, &mut source).unwrap();
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.summary.events_processed, 2);
        assert_eq!(report.summary.events_skipped, 1);
        // Correction disabled by default: energy passes through
        assert_eq!(report.events[0].emitted_energies, vec![2.0]);
    }

    #[test]
    fn test_zero_events() {
        let generator = EventGenerator::new(1, GeneratorConfig::default()).unwrap();
        let summary = run_generated(&HadCorrConfig::default(), &generator, 0, 3).unwrap();
        assert_eq!(summary.events_processed, 0);
        assert!(!summary.histograms.is_empty());
    }
}
