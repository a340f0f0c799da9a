//! HadCorr Simulator CLI
//!
//! Run the hadronic correction over canned scenarios, generated events or a
//! JSON-lines event file.

use clap::Parser;
use hadcorr_core::HadCorrConfig;
use hadcorr_env::JsonLinesSource;
use hadcorr_sim::scenarios::ScenarioId;
use hadcorr_sim::{run_source, HistogramExport, ScenarioResult, ScenarioRunner};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// HadCorr simulation CLI
#[derive(Parser, Debug)]
#[command(name = "hadcorr-sim")]
#[command(about = "Run the hadronic cluster correction on simulated events", long_about = None)]
struct Args {
    /// Master seed for generated events
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of generated events
    #[arg(short = 'n', long, default_value = "1000")]
    events: u64,

    /// Scenario to run (subtract_closest, subtract_all, floor_drop, negative_centrality, random, all)
    #[arg(short = 'S', long, default_value = "random")]
    scenario: String,

    /// JSON configuration file (missing fields take defaults)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the correction setting (0 = off, (0,1] = closest, >1 = all)
    #[arg(long)]
    hadcorr: Option<f64>,

    /// Enable the track→cluster pass and mutual association
    #[arg(long)]
    track_clus: bool,

    /// Worker threads for generated events
    #[arg(short, long, default_value = "1")]
    workers: usize,

    /// Process events from a JSON-lines file instead of a scenario
    #[arg(short, long)]
    input: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export histograms and run metadata to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    let mut config = match &args.config {
        Some(path) => HadCorrConfig::from_file(path).unwrap_or_else(|e| {
            error!("{}", e);
            std::process::exit(1);
        }),
        None => HadCorrConfig::default(),
    };
    if let Some(hadcorr) = args.hadcorr {
        config.hadcorr = hadcorr;
    }
    if args.track_clus {
        config.do_track_clus = true;
    }

    if !args.json {
        info!("HadCorr Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "  hadcorr={} mode={:?} track-clus={} window=({}, {}) min-pt={}",
            config.hadcorr,
            config.correction_mode(),
            config.do_track_clus,
            config.phi_match,
            config.eta_match,
            config.min_pt
        );
    }

    if let Some(path) = &args.input {
        run_input(&args, &config, path);
        return;
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: subtract_closest, subtract_all, floor_drop, negative_centrality, random, all");
            std::process::exit(1);
        })]
    };

    if args.export.is_some() && scenarios.len() > 1 {
        eprintln!("Error: --export only supports a single scenario, not 'all'");
        std::process::exit(1);
    }

    let runner = ScenarioRunner::new(args.seed, config.clone())
        .with_events(args.events)
        .with_workers(args.workers);

    let mut results: Vec<ScenarioResult> = Vec::new();
    for scenario in &scenarios {
        match runner.run(*scenario) {
            Ok(result) => {
                if !args.json {
                    report(&result);
                }
                results.push(result);
            }
            Err(e) => {
                error!("✗ {} could not run: {}", scenario.name(), e);
                std::process::exit(1);
            }
        }
    }

    let exports: Vec<HistogramExport> = results
        .iter()
        .map(|r| HistogramExport::from_result(r, &config))
        .collect();

    if let (Some(path), Some(export)) = (&args.export, exports.first()) {
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} histograms to {}", export.histograms.len(), path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
    }

    let failed_count = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed_count,
            "failed": failed_count,
            "results": exports.iter().map(HistogramExport::summary_json).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", results.len());
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, results.len());
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}

fn report(result: &ScenarioResult) {
    let summary = &result.summary;
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED: {} events, {} skipped",
            result.scenario.name(),
            result.seed,
            summary.events_processed,
            summary.events_skipped
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
    if let (Some(before), Some(after)) = (summary.histograms.h1("Ebefore"), summary.histograms.h1("Eafter")) {
        info!(
            "  cluster energy: {:.1} GeV before, {:.1} GeV after correction",
            before.integral(),
            after.integral()
        );
    }
}

fn run_input(args: &Args, config: &HadCorrConfig, path: &str) {
    let mut source = JsonLinesSource::open(path).unwrap_or_else(|e| {
        error!("Cannot open {}: {}", path, e);
        std::process::exit(1);
    });
    let report = run_source(config, &mut source).unwrap_or_else(|e| {
        error!("Run failed: {}", e);
        std::process::exit(1);
    });

    let emitted: usize = report.events.iter().map(|e| e.emitted_energies.len()).sum();
    let summary = serde_json::json!({
        "input": path,
        "events_processed": report.summary.events_processed,
        "events_skipped": report.summary.events_skipped,
        "clusters_emitted": emitted,
    });

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!(
            "{}: {} events processed, {} skipped, {} clusters emitted",
            path, report.summary.events_processed, report.summary.events_skipped, emitted
        );
    }

    if let Some(export_path) = &args.export {
        let text = match serde_json::to_string_pretty(&report.summary) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode export: {}", e);
                std::process::exit(1);
            }
        };
        match std::fs::write(export_path, text) {
            Ok(()) => info!("Exported {} histograms to {}", report.summary.histograms.len(), export_path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
    }
}
