//! Per-resolution channel lattice and its accumulators.
//!
//! A [`ChannelGrid`] models one SiPM array at a fixed channel pitch. It
//! owns the persistent histograms for that pitch (`all` and `one_hit`
//! families plus the photons-per-channel distribution) and the transient
//! per-event state that realizes the saturating first-hit rule: a hit mask
//! and an occupancy accumulator over the spatial lattice, reset exactly at
//! event boundaries.

use dsipm_core::error::{Error, Result};
use dsipm_core::histogram::{Axis, Hist1D, Hist3D};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for one channel resolution.
///
/// Axis defaults follow the reference detector: a 1 mm² face binned at
/// the channel pitch, a 5–40 ns arrival-time window, radius to the face
/// corner, and a 2 m fiber depth.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelConfig {
    /// Resolution tag, e.g. `"25x25"` for a 25 µm pitch.
    pub tag: String,
    /// Physical channel pitch in µm.
    pub pitch: f64,
    /// Spatial bins per axis (face width / pitch).
    pub xy_bins: usize,
    /// Spatial range on each axis, mm.
    pub xy_range: (f64, f64),
    /// Arrival-time bins.
    pub time_bins: usize,
    /// Arrival-time range, ns.
    pub time_range: (f64, f64),
    /// Radius bins.
    pub radius_bins: usize,
    /// Radius range, mm.
    pub radius_range: (f64, f64),
    /// Depth bins.
    pub depth_bins: usize,
    /// Depth range, mm.
    pub depth_range: (f64, f64),
    /// Event-index bins.
    pub event_bins: usize,
    /// Event-index range.
    pub event_range: (f64, f64),
    /// Upper edge of the photons-per-channel distribution.
    pub occupancy_max: f64,
    /// If set, only first hits from this origin feed the timing spectrum.
    pub timing_origin: Option<u8>,
}

impl ChannelConfig {
    /// Creates a config for the given pitch with default axis ranges.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(pitch: f64, xy_bins: usize) -> Self {
        let p = pitch as u64;
        Self {
            tag: format!("{p}x{p}"),
            pitch,
            xy_bins,
            xy_range: (-0.5, 0.5),
            time_bins: 700,
            time_range: (5.0, 40.0),
            radius_bins: 60,
            radius_range: (0.0, 0.5),
            depth_bins: 500,
            depth_range: (0.0, 2000.0),
            event_bins: 100,
            event_range: (0.0, 100.0),
            occupancy_max: 30.0,
            timing_origin: None,
        }
    }

    /// Restricts the first-hit timing spectrum to one origin index.
    #[must_use]
    pub fn with_timing_origin(mut self, origin: u8) -> Self {
        self.timing_origin = Some(origin);
        self
    }

    /// Overrides the arrival-time axis.
    #[must_use]
    pub fn with_time_axis(mut self, bins: usize, low: f64, high: f64) -> Self {
        self.time_bins = bins;
        self.time_range = (low, high);
        self
    }

    /// Overrides the spatial range on both axes.
    #[must_use]
    pub fn with_xy_range(mut self, low: f64, high: f64) -> Self {
        self.xy_range = (low, high);
        self
    }

    /// Overrides the radius axis.
    #[must_use]
    pub fn with_radius_axis(mut self, bins: usize, low: f64, high: f64) -> Self {
        self.radius_bins = bins;
        self.radius_range = (low, high);
        self
    }

    /// Overrides the depth axis.
    #[must_use]
    pub fn with_depth_axis(mut self, bins: usize, low: f64, high: f64) -> Self {
        self.depth_bins = bins;
        self.depth_range = (low, high);
        self
    }

    /// Overrides the event-index axis.
    #[must_use]
    pub fn with_event_axis(mut self, bins: usize, high: f64) -> Self {
        self.event_bins = bins;
        self.event_range = (0.0, high);
        self
    }
}

/// A geometry-corrected, unit-scaled photon ready for binning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigitizedPhoton {
    /// Corrected x position, mm.
    pub x: f64,
    /// Corrected y position, mm.
    pub y: f64,
    /// Arrival time, ns.
    pub t: f64,
    /// Production depth, mm.
    pub z: f64,
    /// Radius from the face center, mm.
    pub r: f64,
    /// 1-based event index for the event-axis histograms.
    pub event: f64,
    /// Production origin (fiber) index.
    pub origin: u8,
    /// Statistical weight.
    pub weight: f64,
}

/// One fixed-pitch channel lattice with its accumulators.
#[derive(Debug, Clone)]
pub struct ChannelGrid {
    config: ChannelConfig,
    x_axis: Axis,
    y_axis: Axis,

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

    // Transient per-event state over the spatial lattice.
    hit_mask: Vec<bool>,
    occupancy: Vec<f64>,
    touched: Vec<bool>,
    dirty: Vec<usize>,
}

impl ChannelGrid {
    /// Builds the grid and its (empty) histograms for one config.
    ///
    /// # Errors
    /// Returns [`Error::InvalidAxis`] for degenerate axis settings.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(config: ChannelConfig) -> Result<Self> {
        let (xlo, xhi) = config.xy_range;
        let x_axis = Axis::new(config.xy_bins, xlo, xhi)?;
        let y_axis = Axis::new(config.xy_bins, xlo, xhi)?;
        let t_axis = Axis::new(config.time_bins, config.time_range.0, config.time_range.1)?;
        let r_axis = Axis::new(config.radius_bins, config.radius_range.0, config.radius_range.1)?;
        let z_axis = Axis::new(config.depth_bins, config.depth_range.0, config.depth_range.1)?;
        let e_axis = Axis::new(config.event_bins, config.event_range.0, config.event_range.1)?;
        let occ_axis = Axis::new(config.occupancy_max as usize, 0.0, config.occupancy_max)?;

        let n_spatial = config.xy_bins * config.xy_bins;
        Ok(Self {
            config,
            x_axis,
            y_axis,
            all_xyt: Hist3D::new(x_axis, y_axis, t_axis),
            one_hit_xyt: Hist3D::new(x_axis, y_axis, t_axis),
            all_rte: Hist3D::new(r_axis, t_axis, e_axis),
            one_hit_rte: Hist3D::new(r_axis, t_axis, e_axis),
            all_rze: Hist3D::new(r_axis, z_axis, e_axis),
            one_hit_rze: Hist3D::new(r_axis, z_axis, e_axis),
            all_tze: Hist3D::new(t_axis, z_axis, e_axis),
            one_hit_tze: Hist3D::new(t_axis, z_axis, e_axis),
            one_hit_time: Hist1D::new(t_axis),
            occupancy_dist: Hist1D::new(occ_axis),
            hit_mask: vec![false; n_spatial],
            occupancy: vec![0.0; n_spatial],
            touched: vec![false; n_spatial],
            dirty: Vec::new(),
        })
    }

    /// Resolution tag of this grid.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.config.tag
    }

    /// The grid's configuration.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Flat spatial bin index for a corrected position, or `None` when
    /// the photon misses the lattice.
    #[must_use]
    fn spatial_bin(&self, x: f64, y: f64) -> Option<usize> {
        let ix = self.x_axis.index(x)?;
        let iy = self.y_axis.index(y)?;
        Some(ix * self.y_axis.bins() + iy)
    }

    /// Clears the hit mask and occupancy accumulator.
    ///
    /// Only bins touched since the last reset are visited, so this is
    /// O(photons) rather than O(bins).
    fn reset_transient(&mut self) {
        for &bin in &self.dirty {
            self.hit_mask[bin] = false;
            self.occupancy[bin] = 0.0;
            self.touched[bin] = false;
        }
        self.dirty.clear();
    }

    /// Starts a new event: the transient state must be exactly clean
    /// before the first photon is registered.
    pub fn begin_event(&mut self) {
        self.reset_transient();
    }

    /// Registers one valid photon.
    ///
    /// The `all` family always accumulates. The `one_hit` family only
    /// accumulates for the first photon of the event in each spatial bin;
    /// since callers feed photons in ascending time order, that photon is
    /// the earliest arrival in its channel.
    pub fn register(&mut self, p: &DigitizedPhoton) {
        let w = p.weight;
        self.all_xyt.fill(p.x, p.y, p.t, w);
        self.all_rte.fill(p.r, p.t, p.event, w);
        self.all_rze.fill(p.r, p.z, p.event, w);
        self.all_tze.fill(p.t, p.z, p.event, w);

        let Some(bin) = self.spatial_bin(p.x, p.y) else {
            // Off-lattice photons never participate in masking or occupancy.
            return;
        };
        if !self.touched[bin] {
            self.touched[bin] = true;
            self.dirty.push(bin);
        }
        self.occupancy[bin] += w;

        if !self.hit_mask[bin] {
            self.hit_mask[bin] = true;
            self.one_hit_xyt.fill(p.x, p.y, p.t, w);
            self.one_hit_rte.fill(p.r, p.t, p.event, w);
            self.one_hit_rze.fill(p.r, p.z, p.event, w);
            self.one_hit_tze.fill(p.t, p.z, p.event, w);
            if self.config.timing_origin.is_none_or(|o| o == p.origin) {
                self.one_hit_time.fill(p.t, w);
            }
        }
    }

    /// Ends the event: samples the photons-per-channel distribution (one
    /// entry per spatial bin, zeros included) and resets the transient
    /// state.
    pub fn end_event(&mut self) {
        for &count in &self.occupancy {
            self.occupancy_dist.fill(count, 1.0);
        }
        self.reset_transient();
    }

    /// All-hit (x, y, t) histogram.
    #[must_use]
    pub fn all_xyt(&self) -> &Hist3D {
        &self.all_xyt
    }

    /// First-hit (x, y, t) histogram.
    #[must_use]
    pub fn one_hit_xyt(&self) -> &Hist3D {
        &self.one_hit_xyt
    }

    /// All-hit (r, t, event) histogram.
    #[must_use]
    pub fn all_rte(&self) -> &Hist3D {
        &self.all_rte
    }

    /// First-hit (r, t, event) histogram.
    #[must_use]
    pub fn one_hit_rte(&self) -> &Hist3D {
        &self.one_hit_rte
    }

    /// All-hit (r, z, event) histogram.
    #[must_use]
    pub fn all_rze(&self) -> &Hist3D {
        &self.all_rze
    }

    /// First-hit (r, z, event) histogram.
    #[must_use]
    pub fn one_hit_rze(&self) -> &Hist3D {
        &self.one_hit_rze
    }

    /// All-hit (t, z, event) histogram.
    #[must_use]
    pub fn all_tze(&self) -> &Hist3D {
        &self.all_tze
    }

    /// First-hit (t, z, event) histogram.
    #[must_use]
    pub fn one_hit_tze(&self) -> &Hist3D {
        &self.one_hit_tze
    }

    /// First-hit arrival-time spectrum.
    #[must_use]
    pub fn one_hit_time(&self) -> &Hist1D {
        &self.one_hit_time
    }

    /// Photons-per-channel-per-event distribution.
    #[must_use]
    pub fn occupancy_dist(&self) -> &Hist1D {
        &self.occupancy_dist
    }

    /// Folds another grid's persistent accumulators into this one.
    ///
    /// Used by the parallel driver to reduce per-worker grids. Transient
    /// state is not merged; both grids must be between events.
    ///
    /// # Errors
    /// Returns a `ConfigError` on tag mismatch or [`Error::BinningMismatch`]
    /// if any histogram's axes differ.
    pub fn merge_from(&mut self, other: &Self) -> Result<()> {
        if self.config.tag != other.config.tag {
            return Err(Error::ConfigError(format!(
                "cannot merge grid '{}' into grid '{}'",
                other.config.tag, self.config.tag
            )));
        }
        self.all_xyt.merge_from(&other.all_xyt)?;
        self.one_hit_xyt.merge_from(&other.one_hit_xyt)?;
        self.all_rte.merge_from(&other.all_rte)?;
        self.one_hit_rte.merge_from(&other.one_hit_rte)?;
        self.all_rze.merge_from(&other.all_rze)?;
        self.one_hit_rze.merge_from(&other.one_hit_rze)?;
        self.all_tze.merge_from(&other.all_tze)?;
        self.one_hit_tze.merge_from(&other.one_hit_tze)?;
        self.one_hit_time.merge_from(&other.one_hit_time)?;
        self.occupancy_dist.merge_from(&other.occupancy_dist)?;
        Ok(())
    }
}
