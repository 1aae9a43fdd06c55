//! The per-event digitization driver.
//!
//! Drives one event's photon list, in ascending arrival-time order,
//! through every configured channel grid. Selection and the time window
//! are applied here; malformed records are skipped and counted, never
//! fatal. `begin_event`/`end_event` bracket each event so the grids'
//! transient state cannot leak across events.

use crate::channel::{ChannelConfig, DigitizedPhoton};
use crate::geometry::GeometryCorrector;
use crate::resolution::MultiResolutionSet;
use dsipm_core::error::Result;
use dsipm_core::photon::PhotonBatch;
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Digitizer-level settings: acceptance window and unit scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DigitizerConfig {
    /// Acceptance window `[t_min, t_max)` on arrival time, ns.
    pub time_window: (f64, f64),
    /// Scale from raw position units to mm (cm input: 10.0).
    pub position_scale: f64,
    /// Scale on the production depth.
    pub depth_scale: f64,
    /// Offset added to the scaled production depth, mm.
    pub depth_offset: f64,
}

impl Default for DigitizerConfig {
    fn default() -> Self {
        Self {
            time_window: (0.0, 40.0),
            position_scale: 10.0,
            depth_scale: 20.0,
            depth_offset: 2000.0,
        }
    }
}

/// Per-event bookkeeping returned by [`EventDigitizer::process_event`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSummary {
    /// 1-based index of the processed event.
    pub event_index: u64,
    /// Photons that passed selection and were dispatched to the grids.
    pub accepted: usize,
    /// Malformed records (non-finite fields), skipped and counted.
    pub rejected: usize,
    /// Well-formed records that failed selection or the time window.
    pub skipped: usize,
}

/// Drives events through a [`MultiResolutionSet`].
#[derive(Debug, Clone)]
pub struct EventDigitizer {
    corrector: GeometryCorrector,
    grids: MultiResolutionSet,
    config: DigitizerConfig,
    event_offset: u64,
    events_processed: u64,
    photons_accepted: u64,
    rejected_photons: u64,
    photons_skipped: u64,
}

impl EventDigitizer {
    /// Creates a digitizer over the given corrector and resolution set.
    #[must_use]
    pub fn new(
        corrector: GeometryCorrector,
        grids: MultiResolutionSet,
        config: DigitizerConfig,
    ) -> Self {
        Self {
            corrector,
            grids,
            config,
            event_offset: 0,
            events_processed: 0,
            photons_accepted: 0,
            rejected_photons: 0,
            photons_skipped: 0,
        }
    }

    /// Sets the global index of the first event this digitizer will see.
    /// Used by the parallel driver so event-axis histograms stay global.
    #[must_use]
    pub fn with_event_offset(mut self, offset: u64) -> Self {
        self.event_offset = offset;
        self
    }

    /// The resolution set with all accumulated histograms.
    #[must_use]
    pub fn grids(&self) -> &MultiResolutionSet {
        &self.grids
    }

    /// Consumes the digitizer, returning the resolution set.
    #[must_use]
    pub fn into_grids(self) -> MultiResolutionSet {
        self.grids
    }

    /// Events processed so far.
    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Photons accepted across all events.
    #[must_use]
    pub fn photons_accepted(&self) -> u64 {
        self.photons_accepted
    }

    /// Malformed photons rejected across all events.
    #[must_use]
    pub fn rejected_photons(&self) -> u64 {
        self.rejected_photons
    }

    /// Well-formed photons that failed selection across all events.
    #[must_use]
    pub fn photons_skipped(&self) -> u64 {
        self.photons_skipped
    }

    fn is_malformed(batch: &PhotonBatch, i: usize) -> bool {
        !(batch.raw_x[i].is_finite()
            && batch.raw_y[i].is_finite()
            && batch.z_produced[i].is_finite()
            && batch.z_final[i].is_finite()
            && batch.time[i].is_finite()
            && batch.weight[i].is_finite())
    }

    /// Digitizes one event.
    ///
    /// Records are visited in ascending arrival-time order (stable on
    /// ties), so the first-hit rule is deterministic. An event with zero
    /// valid photons is legal and contributes only zero occupancy samples.
    ///
    /// # Errors
    /// Returns [`dsipm_core::Error::OriginOutOfRange`] if a record names
    /// an origin with no geometry entry; this is a configuration fault,
    /// not a data fault.
    #[allow(clippy::cast_precision_loss)]
    pub fn process_event(&mut self, batch: &PhotonBatch) -> Result<EventSummary> {
        let event_index = self.event_offset + self.events_processed + 1;
        let mut summary = EventSummary {
            event_index,
            ..EventSummary::default()
        };

        let order = batch.time_order();
        self.grids.begin_event();
        for i in order {
            if Self::is_malformed(batch, i) {
                summary.rejected += 1;
                continue;
            }
            let t = batch.time[i];
            let (t_min, t_max) = self.config.time_window;
            if !batch.selected[i] || batch.z_final[i] <= 0.0 || t < t_min || t >= t_max {
                summary.skipped += 1;
                continue;
            }

            let origin = batch.origin[i];
            let (cx, cy) = self
                .corrector
                .correct(batch.raw_x[i], batch.raw_y[i], usize::from(origin))?;
            let x = cx * self.config.position_scale;
            let y = cy * self.config.position_scale;
            let z = self.config.depth_scale * batch.z_produced[i] + self.config.depth_offset;
            let r = x.hypot(y);

            self.grids.register(&DigitizedPhoton {
                x,
                y,
                t,
                z,
                r,
                event: event_index as f64,
                origin,
                weight: batch.weight[i],
            });
            summary.accepted += 1;
        }
        self.grids.end_event();

        self.events_processed += 1;
        self.photons_accepted += summary.accepted as u64;
        self.rejected_photons += summary.rejected as u64;
        self.photons_skipped += summary.skipped as u64;
        Ok(summary)
    }

    /// Digitizes a sequence of events in order.
    ///
    /// # Errors
    /// Propagates the first configuration error; data faults never abort.
    pub fn process_events(&mut self, batches: &[PhotonBatch]) -> Result<()> {
        for batch in batches {
            self.process_event(batch)?;
        }
        Ok(())
    }

    /// Folds a worker digitizer's accumulators and counters into this one.
    fn absorb(&mut self, other: &Self) -> Result<()> {
        self.grids.merge_from(&other.grids)?;
        self.events_processed += other.events_processed;
        self.photons_accepted += other.photons_accepted;
        self.rejected_photons += other.rejected_photons;
        self.photons_skipped += other.photons_skipped;
        Ok(())
    }
}

/// Digitizes `batches` across rayon workers and merges the results.
///
/// Each worker owns an independent set of grids (the transient per-event
/// state is not shareable); only the persistent accumulators are merged,
/// which are commutative sums across events. Results match the sequential
/// driver up to f64 summation order.
///
/// # Errors
/// Propagates configuration errors from grid construction or from any
/// worker.
pub fn process_events_parallel(
    corrector: &GeometryCorrector,
    configs: &[ChannelConfig],
    config: DigitizerConfig,
    batches: &[PhotonBatch],
    events_per_worker: usize,
) -> Result<EventDigitizer> {
    let chunk = events_per_worker.max(1);
    let workers: Vec<EventDigitizer> = batches
        .par_chunks(chunk)
        .enumerate()
        .map(|(chunk_index, chunk_batches)| {
            let grids = MultiResolutionSet::new(configs.to_vec())?;
            let mut worker = EventDigitizer::new(corrector.clone(), grids, config)
                .with_event_offset((chunk_index * chunk) as u64);
            worker.process_events(chunk_batches)?;
            Ok(worker)
        })
        .collect::<Result<_>>()?;

    let grids = MultiResolutionSet::new(configs.to_vec())?;
    let mut merged = EventDigitizer::new(corrector.clone(), grids, config);
    for worker in &workers {
        merged.absorb(worker)?;
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ShrinkTable;
    use dsipm_core::photon::PhotonRecord;

    fn simple_digitizer() -> EventDigitizer {
        let corrector =
            GeometryCorrector::new(vec![0.0], vec![0.0], ShrinkTable::identity()).unwrap();
        let config = ChannelConfig::new(100.0, 30)
            .with_time_axis(70, 5.0, 40.0)
            .with_radius_axis(12, 0.0, 0.5)
            .with_depth_axis(20, 0.0, 2000.0)
            .with_event_axis(10, 10.0);
        let grids = MultiResolutionSet::new(vec![config]).unwrap();
        EventDigitizer::new(corrector, grids, DigitizerConfig::default())
    }

    fn record(t: f64) -> PhotonRecord {
        PhotonRecord {
            raw_x: 0.0,
            raw_y: 0.0,
            z_produced: 50.0,
            z_final: 1.0,
            time: t,
            origin: 0,
            selected: true,
            weight: 1.0,
        }
    }

    #[test]
    fn test_empty_event_is_legal() {
        let mut d = simple_digitizer();
        let summary = d.process_event(&PhotonBatch::default()).unwrap();
        assert_eq!(summary.accepted, 0);
        assert_eq!(d.events_processed(), 1);
        // Every spatial bin still contributes a zero occupancy sample.
        let grid = d.grids().get("100x100").unwrap();
        assert_eq!(grid.occupancy_dist().entries(), 900);
    }

    #[test]
    fn test_malformed_records_counted_not_fatal() {
        let mut d = simple_digitizer();
        let mut batch = PhotonBatch::default();
        batch.push(record(10.0));
        let mut bad = record(11.0);
        bad.raw_x = f64::NAN;
        batch.push(bad);

        let summary = d.process_event(&batch).unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(d.rejected_photons(), 1);
    }

    #[test]
    fn test_selection_and_window() {
        let mut d = simple_digitizer();
        let mut batch = PhotonBatch::default();
        batch.push(record(10.0)); // accepted
        let mut unselected = record(10.0);
        unselected.selected = false;
        batch.push(unselected);
        let mut absorbed = record(10.0);
        absorbed.z_final = -1.0;
        batch.push(absorbed);
        batch.push(record(40.0)); // at t_max: excluded (half-open window)

        let summary = d.process_event(&batch).unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.skipped, 3);
    }

    #[test]
    fn test_unknown_origin_is_fatal() {
        let mut d = simple_digitizer();
        let mut batch = PhotonBatch::default();
        let mut r = record(10.0);
        r.origin = 7;
        batch.push(r);
        assert!(d.process_event(&batch).is_err());
    }
}
