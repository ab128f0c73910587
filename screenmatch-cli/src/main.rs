use clap::Parser;
use screenmatch::image::io::load_targets_from;
use screenmatch::{
    FileRaster, MatchOutcome, Occurrence, SearchConfig, SearchCoordinator, SearchRegion,
    SearchRequest,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "screenmatch CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
struct RegionJson {
    x: isize,
    y: isize,
    width: usize,
    height: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SearchConfigJson {
    pieces: usize,
    parallel: bool,
    workers: usize,
    retry_interval_ms: u64,
}

impl Default for SearchConfigJson {
    fn default() -> Self {
        let cfg = SearchConfig::default();
        Self {
            pieces: cfg.pieces,
            parallel: cfg.parallel,
            workers: cfg.workers,
            retry_interval_ms: u64::try_from(cfg.retry_interval.as_millis()).unwrap_or(100),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    /// Screenshot re-read on every attempt.
    raster_path: String,
    /// Target image file, or a directory of candidate targets.
    target_path: String,
    output_path: Option<String>,
    region: Option<RegionJson>,
    /// `0` first, `-1` any, `n > 0` the n-th occurrence.
    index: i64,
    tolerance_percent: u8,
    fuzzy: bool,
    timeout_ms: u64,
    search: SearchConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raster_path: String::new(),
            target_path: String::new(),
            output_path: None,
            region: None,
            index: 0,
            tolerance_percent: SearchConfig::default().default_tolerance_percent,
            fuzzy: false,
            timeout_ms: 0,
            search: SearchConfigJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct NearMissRecord {
    x: usize,
    y: usize,
    percent: f32,
}

#[derive(Debug, Serialize)]
struct Output {
    matched: bool,
    target: Option<String>,
    x: Option<usize>,
    y: Option<usize>,
    width: Option<usize>,
    height: Option<usize>,
    errors: usize,
    strategy: &'static str,
    attempts: usize,
    closest: Option<NearMissRecord>,
}

impl Output {
    fn from_outcome(target: Option<String>, outcome: &MatchOutcome) -> Self {
        let rect = outcome.matched_rect();
        Self {
            matched: outcome.matched,
            target,
            x: rect.map(|r| r.x),
            y: rect.map(|r| r.y),
            width: rect.map(|r| r.width),
            height: rect.map(|r| r.height),
            errors: outcome.errors,
            strategy: outcome.strategy.as_str(),
            attempts: outcome.attempts,
            closest: outcome.closest.map(|near| NearMissRecord {
                x: near.anchor.x,
                y: near.anchor.y,
                percent: near.percent,
            }),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("screenmatch=debug".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.raster_path.is_empty() || config.target_path.is_empty() {
        return Err("raster_path and target_path must be set in the config".into());
    }

    let coordinator = SearchCoordinator::new(SearchConfig {
        pieces: config.search.pieces,
        parallel: config.search.parallel,
        workers: config.search.workers,
        retry_interval: Duration::from_millis(config.search.retry_interval_ms),
        ..SearchConfig::default()
    })?;

    let mut request = SearchRequest::new()
        .with_occurrence(Occurrence::from_index(config.index)?)
        .with_tolerance(config.tolerance_percent)
        .with_fuzzy(config.fuzzy)
        .with_timeout(Duration::from_millis(config.timeout_ms));
    if let Some(region) = &config.region {
        request = request.with_region(SearchRegion::new(
            region.x,
            region.y,
            region.width,
            region.height,
        )?);
    }

    let targets = load_targets_from(&config.target_path)?;
    tracing::info!(targets = targets.len(), "loaded targets");
    let mut screen = FileRaster::new(&config.raster_path);

    let (index, outcome) = if targets.len() == 1 {
        (0, coordinator.locate(&mut screen, &targets[0], &request)?)
    } else {
        coordinator.search_first_of(&mut screen, &targets, &request)?
    };
    let output = Output::from_outcome(targets[index].name().map(str::to_owned), &outcome);

    let json = serde_json::to_string_pretty(&output)?;
    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
