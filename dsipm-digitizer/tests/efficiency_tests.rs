#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]
use approx::assert_relative_eq;
use dsipm_digitizer::{
    ChannelConfig, DigitizerConfig, EfficiencyEstimator, EventDigitizer, GeometryCorrector,
    MultiResolutionSet, PhotonBatch, PhotonRecord, ProjectionPlane, ShrinkTable,
    DEFAULT_EFFICIENCY_FLOOR,
};

fn record(x: f64, y: f64, t: f64) -> PhotonRecord {
    PhotonRecord {
        raw_x: x,
        raw_y: y,
        z_produced: 20.0,
        z_final: 1.0,
        time: t,
        origin: 0,
        selected: true,
        weight: 1.0,
    }
}

fn run_events(n_events: usize, photons_per_channel: usize) -> EventDigitizer {
    let corrector =
        GeometryCorrector::new(vec![0.0], vec![0.0], ShrinkTable::identity()).unwrap();
    let mut d = EventDigitizer::new(
        corrector,
        MultiResolutionSet::new(vec![ChannelConfig::new(100.0, 30)
            .with_time_axis(70, 5.0, 40.0)
            .with_radius_axis(12, 0.0, 0.5)
            .with_depth_axis(20, 0.0, 2000.0)
            .with_event_axis(10, 10.0)])
        .unwrap(),
        DigitizerConfig::default(),
    );
    for _ in 0..n_events {
        let mut batch = PhotonBatch::default();
        for k in 0..photons_per_channel {
            batch.push(record(0.0, 0.0, 10.0 + k as f64));
        }
        d.process_event(&batch).unwrap();
    }
    d
}

#[test]
fn pipeline_efficiency_matches_saturation_ratio() {
    // 5 events, 4 photons each in one channel: one-hit = 5, all = 20.
    let d = run_events(5, 4);
    let grid = d.grids().get("100x100").unwrap();

    let estimator = EfficiencyEstimator::new();
    let eff = estimator
        .estimate_projected(grid.one_hit_xyt(), grid.all_xyt(), ProjectionPlane::Xy)
        .unwrap();

    let ix = eff.x_axis().index(0.0).unwrap();
    let iy = eff.y_axis().index(0.0).unwrap();
    assert_relative_eq!(eff.value(ix, iy), 0.25);
    assert_relative_eq!(eff.error(ix, iy), (0.25_f64 * 0.75 / 20.0).sqrt());
}

#[test]
fn empty_region_is_zero_not_floor() {
    let d = run_events(2, 3);
    let grid = d.grids().get("100x100").unwrap();
    let eff = EfficiencyEstimator::new()
        .estimate_projected(grid.one_hit_xyt(), grid.all_xyt(), ProjectionPlane::Xy)
        .unwrap();

    // A corner channel nothing ever hit: denominator zero, exact zero out.
    assert_relative_eq!(eff.value(0, 0), 0.0);
    assert_relative_eq!(eff.error(0, 0), 0.0);
    assert!(eff.value(0, 0) != DEFAULT_EFFICIENCY_FLOOR);
}

#[test]
fn all_three_projections_are_consistent() {
    let d = run_events(3, 5);
    let grid = d.grids().get("100x100").unwrap();
    let projections = EfficiencyEstimator::new()
        .estimate_all_projections(grid.one_hit_xyt(), grid.all_xyt())
        .unwrap();

    assert_eq!(projections.len(), 3);
    for (plane, eff) in &projections {
        for (i, v) in eff.values().iter().enumerate() {
            let is_ratio = (0.0..=1.0).contains(v);
            assert!(
                is_ratio || *v == DEFAULT_EFFICIENCY_FLOOR,
                "bin {} of {:?} projection out of range: {}",
                i,
                plane,
                v
            );
        }
        for e in eff.errors() {
            assert!(*e >= 0.0);
        }
    }
}

#[test]
fn windowed_projection_restricts_time_band() {
    let d = run_events(2, 4); // photons at t = 10, 11, 12, 13
    let grid = d.grids().get("100x100").unwrap();

    let full = grid.all_xyt().project(ProjectionPlane::Xy);
    let band = grid
        .all_xyt()
        .project_window(ProjectionPlane::Xy, Some((9.5, 11.5)));
    assert_relative_eq!(full.total_weight(), 8.0);
    assert_relative_eq!(band.total_weight(), 4.0);
}
