//! Command-line driver for the dSiPM digitization engine.
//!
//! Thin I/O wrapper: reads per-event photon columns from JSON, runs the
//! digitizer, and writes named histograms (and derived efficiency grids)
//! back out as JSON. All algorithmic content lives in `dsipm-digitizer`.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use dsipm_digitizer::{
    process_events_parallel, ChannelConfig, DigitizerConfig, EfficiencyEstimator,
    EfficiencyGrid, EventDigitizer, GeometryCorrector, Hist1D, Hist3D, MultiResolutionSet,
    PhotonBatch, ProjectionPlane, ShrinkStep, ShrinkTable,
};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("engine error: {0}")]
    Engine(#[from] dsipm_digitizer::Error),
}

/// Multi-resolution dSiPM photon digitization and efficiency estimation.
#[derive(Parser)]
#[command(name = "dsipm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Digitize per-event photon lists into histograms
    Digitize {
        /// Input events file (JSON, one column set per event)
        input: PathBuf,

        /// Output histograms file path
        #[arg(short, long)]
        output: PathBuf,

        /// Detector configuration file (JSON); defaults apply if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Process events in parallel with this many events per worker
        #[arg(long)]
        events_per_worker: Option<usize>,

        /// Verbose per-event output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compute efficiency grids from a digitized histograms file
    Efficiency {
        /// Histograms file produced by `digitize`
        input: PathBuf,

        /// Output efficiency file path
        #[arg(short, long)]
        output: PathBuf,

        /// Floor value for zero-numerator bins
        #[arg(long, default_value = "0.001")]
        floor: f64,
    },

    /// Show information about an events file
    Info {
        /// Input events file
        input: PathBuf,
    },
}

/// One event's photon columns, as supplied by the transport simulation.
#[derive(Deserialize)]
struct EventColumns {
    raw_x: Vec<f64>,
    raw_y: Vec<f64>,
    z_produced: Vec<f64>,
    z_final: Vec<f64>,
    time: Vec<f64>,
    origin: Vec<u8>,
    selected: Vec<bool>,
    #[serde(default)]
    weight: Option<Vec<f64>>,
}

impl EventColumns {
    fn into_batch(self) -> PhotonBatch {
        let n = self.raw_x.len();
        PhotonBatch {
            weight: self.weight.unwrap_or_else(|| vec![1.0; n]),
            raw_x: self.raw_x,
            raw_y: self.raw_y,
            z_produced: self.z_produced,
            z_final: self.z_final,
            time: self.time,
            origin: self.origin,
            selected: self.selected,
        }
    }
}

/// On-disk detector configuration.
#[derive(Deserialize)]
#[serde(default)]
struct DetectorFile {
    shift_x: Vec<f64>,
    shift_y: Vec<f64>,
    shrink_steps: Vec<ShrinkStepFile>,
    saturation_shift: f64,
    time_window: (f64, f64),
    position_scale: f64,
    depth_scale: f64,
    depth_offset: f64,
    resolutions: Vec<ResolutionFile>,
    // Axis binning shared by all resolutions; None keeps library defaults.
    time_axis: Option<(usize, f64, f64)>,
    radius_axis: Option<(usize, f64, f64)>,
    depth_axis: Option<(usize, f64, f64)>,
    event_axis: Option<(usize, f64)>,
}

#[derive(Deserialize)]
struct ShrinkStepFile {
    limit: f64,
    shift: f64,
}

#[derive(Deserialize)]
struct ResolutionFile {
    pitch: f64,
    xy_bins: usize,
    #[serde(default)]
    timing_origin: Option<u8>,
}

impl Default for DetectorFile {
    fn default() -> Self {
        // Reference four-fiber geometry and pitch scan.
        Self {
            shift_x: vec![3.2908, 3.2205, 3.3597, 3.2898],
            shift_y: vec![-3.6878, -3.7287, -3.7284, -3.6075],
            shrink_steps: Vec::new(),
            saturation_shift: 0.0,
            time_window: (0.0, 40.0),
            position_scale: 10.0,
            depth_scale: 20.0,
            depth_offset: 2000.0,
            resolutions: vec![
                ResolutionFile { pitch: 25.0, xy_bins: 120, timing_origin: None },
                ResolutionFile { pitch: 50.0, xy_bins: 60, timing_origin: None },
                ResolutionFile { pitch: 75.0, xy_bins: 40, timing_origin: None },
                ResolutionFile { pitch: 100.0, xy_bins: 30, timing_origin: None },
                ResolutionFile { pitch: 200.0, xy_bins: 15, timing_origin: None },
                ResolutionFile { pitch: 300.0, xy_bins: 10, timing_origin: None },
                ResolutionFile { pitch: 600.0, xy_bins: 5, timing_origin: None },
            ],
            time_axis: None,
            radius_axis: None,
            depth_axis: None,
            event_axis: None,
        }
    }
}

impl DetectorFile {
    fn corrector(&self) -> Result<GeometryCorrector> {
        let steps = self
            .shrink_steps
            .iter()
            .map(|s| ShrinkStep { limit: s.limit, shift: s.shift })
            .collect();
        let shrink = ShrinkTable::new(steps, self.saturation_shift)?;
        Ok(GeometryCorrector::new(
            self.shift_x.clone(),
            self.shift_y.clone(),
            shrink,
        )?)
    }

    fn channel_configs(&self) -> Vec<ChannelConfig> {
        self.resolutions
            .iter()
            .map(|r| {
                let mut config = ChannelConfig::new(r.pitch, r.xy_bins);
                if let Some(origin) = r.timing_origin {
                    config = config.with_timing_origin(origin);
                }
                if let Some((bins, low, high)) = self.time_axis {
                    config = config.with_time_axis(bins, low, high);
                }
                if let Some((bins, low, high)) = self.radius_axis {
                    config = config.with_radius_axis(bins, low, high);
                }
                if let Some((bins, low, high)) = self.depth_axis {
                    config = config.with_depth_axis(bins, low, high);
                }
                if let Some((bins, high)) = self.event_axis {
                    config = config.with_event_axis(bins, high);
                }
                config
            })
            .collect()
    }

    fn digitizer_config(&self) -> DigitizerConfig {
        DigitizerConfig {
            time_window: self.time_window,
            position_scale: self.position_scale,
            depth_scale: self.depth_scale,
            depth_offset: self.depth_offset,
        }
    }
}

/// Per-resolution histogram set, as written by `digitize`.
#[derive(Serialize, Deserialize)]
struct GridFile {
    tag: String,
    all_xyt: Hist3D,
    one_hit_xyt: Hist3D,
    all_rte: Hist3D,
    one_hit_rte: Hist3D,
    all_rze: Hist3D,
    one_hit_rze: Hist3D,
    all_tze: Hist3D,
    one_hit_tze: Hist3D,
    one_hit_time: Hist1D,
    occupancy_dist: Hist1D,
}

#[derive(Serialize, Deserialize)]
struct HistogramsFile {
    events: u64,
    photons_accepted: u64,
    rejected_photons: u64,
    photons_skipped: u64,
    grids: Vec<GridFile>,
}

#[derive(Serialize)]
struct EfficiencyFile {
    floor: f64,
    // Keyed by "<tag>_<family>_<plane>", e.g. "25x25_xyt_xy".
    grids: BTreeMap<String, EfficiencyGrid>,
}

fn load_events(path: &Path) -> Result<Vec<PhotonBatch>> {
    let text = fs::read_to_string(path)?;
    let columns: Vec<EventColumns> = serde_json::from_str(&text)?;
    Ok(columns.into_iter().map(EventColumns::into_batch).collect())
}

fn load_detector(path: Option<&Path>) -> Result<DetectorFile> {
    match path {
        Some(p) => {
            let text = fs::read_to_string(p)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(DetectorFile::default()),
    }
}

fn export(digitizer: &EventDigitizer) -> HistogramsFile {
    let grids = digitizer
        .grids()
        .iter()
        .map(|grid| GridFile {
            tag: grid.tag().to_string(),
            all_xyt: grid.all_xyt().clone(),
            one_hit_xyt: grid.one_hit_xyt().clone(),
            all_rte: grid.all_rte().clone(),
            one_hit_rte: grid.one_hit_rte().clone(),
            all_rze: grid.all_rze().clone(),
            one_hit_rze: grid.one_hit_rze().clone(),
            all_tze: grid.all_tze().clone(),
            one_hit_tze: grid.one_hit_tze().clone(),
            one_hit_time: grid.one_hit_time().clone(),
            occupancy_dist: grid.occupancy_dist().clone(),
        })
        .collect();
    HistogramsFile {
        events: digitizer.events_processed(),
        photons_accepted: digitizer.photons_accepted(),
        rejected_photons: digitizer.rejected_photons(),
        photons_skipped: digitizer.photons_skipped(),
        grids,
    }
}

fn cmd_digitize(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    events_per_worker: Option<usize>,
    verbose: bool,
) -> Result<()> {
    let start = Instant::now();
    let detector = load_detector(config)?;
    let corrector = detector.corrector()?;
    let configs = detector.channel_configs();
    let digitizer_config = detector.digitizer_config();
    let events = load_events(input)?;
    log::info!(
        "loaded {} events from {} in {:.2?}",
        events.len(),
        input.display(),
        start.elapsed()
    );

    let run = Instant::now();
    let digitizer = match events_per_worker {
        Some(chunk) => {
            process_events_parallel(&corrector, &configs, digitizer_config, &events, chunk)?
        }
        None => {
            let grids = MultiResolutionSet::new(configs)?;
            let mut d = EventDigitizer::new(corrector, grids, digitizer_config);
            for (i, batch) in events.iter().enumerate() {
                let summary = d.process_event(batch)?;
                if verbose {
                    println!(
                        "event {}: {} accepted, {} skipped, {} rejected",
                        i + 1,
                        summary.accepted,
                        summary.skipped,
                        summary.rejected
                    );
                }
            }
            d
        }
    };
    log::info!(
        "digitized {} photons over {} resolutions in {:.2?}",
        digitizer.photons_accepted(),
        digitizer.grids().len(),
        run.elapsed()
    );
    if digitizer.rejected_photons() > 0 {
        log::warn!(
            "{} malformed photon records were rejected",
            digitizer.rejected_photons()
        );
    }

    let file = export(&digitizer);
    fs::write(output, serde_json::to_vec(&file)?)?;
    println!(
        "wrote {} histogram sets to {} ({:.2?} total)",
        file.grids.len(),
        output.display(),
        start.elapsed()
    );
    Ok(())
}

fn plane_tag(plane: ProjectionPlane) -> &'static str {
    match plane {
        ProjectionPlane::Xy => "xy",
        ProjectionPlane::Xz => "xz",
        ProjectionPlane::Yz => "yz",
    }
}

fn cmd_efficiency(input: &Path, output: &Path, floor: f64) -> Result<()> {
    let text = fs::read_to_string(input)?;
    let file: HistogramsFile = serde_json::from_str(&text)?;
    let estimator = EfficiencyEstimator::new().with_floor(floor);

    let mut grids = BTreeMap::new();
    for grid in &file.grids {
        for (family, num, den) in [
            ("xyt", &grid.one_hit_xyt, &grid.all_xyt),
            ("rte", &grid.one_hit_rte, &grid.all_rte),
            ("rze", &grid.one_hit_rze, &grid.all_rze),
            ("tze", &grid.one_hit_tze, &grid.all_tze),
        ] {
            for (plane, eff) in estimator.estimate_all_projections(num, den)? {
                let key = format!("{}_{}_{}", grid.tag, family, plane_tag(plane));
                grids.insert(key, eff);
            }
        }
    }

    let count = grids.len();
    fs::write(output, serde_json::to_vec(&EfficiencyFile { floor, grids })?)?;
    println!("wrote {} efficiency grids to {}", count, output.display());
    Ok(())
}

fn cmd_info(input: &Path) -> Result<()> {
    let events = load_events(input)?;
    let total: usize = events.iter().map(PhotonBatch::len).sum();
    let selected: usize = events
        .iter()
        .map(|b| b.selected.iter().filter(|&&s| s).count())
        .sum();
    println!("events:            {}", events.len());
    println!("photons:           {}", total);
    println!("selected photons:  {}", selected);
    if let Some(largest) = events.iter().map(PhotonBatch::len).max() {
        println!("largest event:     {} photons", largest);
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Digitize {
            input,
            output,
            config,
            events_per_worker,
            verbose,
        } => cmd_digitize(input, output, config.as_deref(), *events_per_worker, *verbose),
        Commands::Efficiency { input, output, floor } => cmd_efficiency(input, output, *floor),
        Commands::Info { input } => cmd_info(input),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events_json() -> &'static str {
        // Two photons at the face center of the corrected frame (the
        // default geometry shifts fiber 0 by (3.2908, -3.6878)).
        r#"[{
            "raw_x": [-3.2908, -3.2908],
            "raw_y": [3.6878, 3.6878],
            "z_produced": [20.0, 20.0],
            "z_final": [1.0, 1.0],
            "time": [10.0, 12.0],
            "origin": [0, 0],
            "selected": [true, true]
        }]"#
    }

    fn config_json() -> &'static str {
        // One coarse resolution with reduced axis binning.
        r#"{
            "resolutions": [{"pitch": 100.0, "xy_bins": 30}],
            "time_axis": [70, 5.0, 40.0],
            "radius_axis": [12, 0.0, 0.5],
            "depth_axis": [20, 0.0, 2000.0],
            "event_axis": [10, 10.0]
        }"#
    }

    fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
        let events = dir.join("events.json");
        let config = dir.join("detector.json");
        fs::write(&events, events_json()).unwrap();
        fs::write(&config, config_json()).unwrap();
        (events, config)
    }

    #[test]
    fn test_digitize_then_efficiency_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (events, config) = write_inputs(dir.path());
        let histos = dir.path().join("histos.json");
        let eff = dir.path().join("eff.json");

        cmd_digitize(&events, &histos, Some(&config), None, false).unwrap();
        let parsed: HistogramsFile =
            serde_json::from_str(&fs::read_to_string(&histos).unwrap()).unwrap();
        assert_eq!(parsed.events, 1);
        assert_eq!(parsed.photons_accepted, 2);
        assert_eq!(parsed.grids.len(), 1);
        assert_eq!(parsed.grids[0].tag, "100x100");

        cmd_efficiency(&histos, &eff, 0.001).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&eff).unwrap()).unwrap();
        // 1 resolution x 4 histogram families x 3 planes.
        assert_eq!(value["grids"].as_object().unwrap().len(), 12);
        assert!(value["grids"]
            .as_object()
            .unwrap()
            .contains_key("100x100_xyt_xy"));
    }

    #[test]
    fn test_default_pitch_scan() {
        let tags: Vec<String> = DetectorFile::default()
            .channel_configs()
            .into_iter()
            .map(|c| c.tag)
            .collect();
        assert_eq!(
            tags,
            ["25x25", "50x50", "75x75", "100x100", "200x200", "300x300", "600x600"]
        );
    }

    #[test]
    fn test_default_weight_column() {
        let columns: Vec<EventColumns> = serde_json::from_str(events_json()).unwrap();
        let batch = columns.into_iter().next().unwrap().into_batch();
        assert_eq!(batch.weight, vec![1.0, 1.0]);
    }

    #[test]
    fn test_parallel_digitize_matches_event_count() {
        let dir = tempfile::tempdir().unwrap();
        let (events, config) = write_inputs(dir.path());
        let histos = dir.path().join("histos.json");

        cmd_digitize(&events, &histos, Some(&config), Some(2), false).unwrap();
        let parsed: HistogramsFile =
            serde_json::from_str(&fs::read_to_string(&histos).unwrap()).unwrap();
        assert_eq!(parsed.events, 1);
        assert_eq!(parsed.photons_accepted, 2);
    }
}
