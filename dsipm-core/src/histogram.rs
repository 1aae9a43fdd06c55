//! Weighted histograms with uniform binning.
//!
//! Data is stored in flat row-major arrays (`data[(ix * ny + iy) * nz + iz]`
//! for 3D), which keeps fills cache-friendly for the per-photon hot loop.
//! Values outside an axis range are dropped on fill, never an error;
//! this is conventional under/overflow discard.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A uniformly binned axis over the half-open interval `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Axis {
    bins: usize,
    low: f64,
    high: f64,
}

impl Axis {
    /// Creates a new axis.
    ///
    /// # Errors
    /// Returns [`Error::InvalidAxis`] if `bins` is zero, the range is
    /// inverted or degenerate, or an edge is non-finite.
    pub fn new(bins: usize, low: f64, high: f64) -> Result<Self> {
        if bins == 0 || !low.is_finite() || !high.is_finite() || low >= high {
            return Err(Error::InvalidAxis { bins, low, high });
        }
        Ok(Self { bins, low, high })
    }

    /// Number of bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Lower edge of the axis.
    #[must_use]
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Upper edge of the axis.
    #[must_use]
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Bin width.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn width(&self) -> f64 {
        (self.high - self.low) / self.bins as f64
    }

    /// Maps a value to its bin index, or `None` if the value is
    /// non-finite or outside `[low, high)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.low || value >= self.high {
            return None;
        }
        let frac = (value - self.low) / (self.high - self.low);
        let bin = (frac * self.bins as f64) as usize;
        // Guard against frac rounding up to 1.0 at the upper edge.
        Some(bin.min(self.bins - 1))
    }

    /// Center of bin `i`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn center(&self, i: usize) -> f64 {
        self.low + (i as f64 + 0.5) * self.width()
    }
}

fn check_axes(role: &str, a: Axis, b: Axis) -> Result<()> {
    if a == b {
        Ok(())
    } else {
        Err(Error::BinningMismatch(format!(
            "{role} axis: {} bins [{}, {}) vs {} bins [{}, {})",
            a.bins, a.low, a.high, b.bins, b.low, b.high
        )))
    }
}

/// A 1D weighted histogram.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hist1D {
    axis: Axis,
    data: Vec<f64>,
    entries: u64,
}

impl Hist1D {
    /// Creates an empty histogram over the given axis.
    #[must_use]
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            data: vec![0.0; axis.bins()],
            entries: 0,
        }
    }

    /// The binning axis.
    #[must_use]
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Adds `weight` at `value`; out-of-range values are dropped.
    pub fn fill(&mut self, value: f64, weight: f64) {
        if let Some(i) = self.axis.index(value) {
            self.data[i] += weight;
            self.entries += 1;
        }
    }

    /// Content of bin `i`.
    #[must_use]
    pub fn bin(&self, i: usize) -> f64 {
        self.data[i]
    }

    /// Number of in-range fills.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of all bin contents.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Flat view of the bin contents.
    #[must_use]
    pub fn contents(&self) -> &[f64] {
        &self.data
    }

    /// Adds another histogram's contents into this one.
    ///
    /// # Errors
    /// Returns [`Error::BinningMismatch`] if the axes differ.
    pub fn merge_from(&mut self, other: &Self) -> Result<()> {
        check_axes("x", self.axis, other.axis)?;
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            *dst += src;
        }
        self.entries += other.entries;
        Ok(())
    }
}

/// A 2D weighted histogram.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hist2D {
    x: Axis,
    y: Axis,
    data: Vec<f64>,
    entries: u64,
}

impl Hist2D {
    /// Creates an empty histogram over the given axes.
    #[must_use]
    pub fn new(x: Axis, y: Axis) -> Self {
        Self {
            x,
            y,
            data: vec![0.0; x.bins() * y.bins()],
            entries: 0,
        }
    }

    /// The x axis.
    #[must_use]
    pub fn x_axis(&self) -> Axis {
        self.x
    }

    /// The y axis.
    #[must_use]
    pub fn y_axis(&self) -> Axis {
        self.y
    }

    /// Adds `weight` at `(x, y)`; out-of-range values are dropped.
    pub fn fill(&mut self, x: f64, y: f64, weight: f64) {
        if let (Some(ix), Some(iy)) = (self.x.index(x), self.y.index(y)) {
            self.data[ix * self.y.bins() + iy] += weight;
            self.entries += 1;
        }
    }

    /// Content of bin `(ix, iy)`.
    #[must_use]
    pub fn bin(&self, ix: usize, iy: usize) -> f64 {
        self.data[ix * self.y.bins() + iy]
    }

    /// Number of in-range fills.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of all bin contents.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Flat view of the bin contents, row-major in x.
    #[must_use]
    pub fn contents(&self) -> &[f64] {
        &self.data
    }

    /// True if `other` uses identical binning on both axes.
    #[must_use]
    pub fn same_binning(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }

    /// Adds another histogram's contents into this one.
    ///
    /// # Errors
    /// Returns [`Error::BinningMismatch`] if any axis differs.
    pub fn merge_from(&mut self, other: &Self) -> Result<()> {
        check_axes("x", self.x, other.x)?;
        check_axes("y", self.y, other.y)?;
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            *dst += src;
        }
        self.entries += other.entries;
        Ok(())
    }
}

/// Which axis of a [`Hist3D`] a projection sums out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionPlane {
    /// Keep (x, y), sum over z.
    Xy,
    /// Keep (x, z), sum over y.
    Xz,
    /// Keep (y, z), sum over x.
    Yz,
}

/// A 3D weighted histogram.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hist3D {
    x: Axis,
    y: Axis,
    z: Axis,
    data: Vec<f64>,
    entries: u64,
}

impl Hist3D {
    /// Creates an empty histogram over the given axes.
    #[must_use]
    pub fn new(x: Axis, y: Axis, z: Axis) -> Self {
        Self {
            x,
            y,
            z,
            data: vec![0.0; x.bins() * y.bins() * z.bins()],
            entries: 0,
        }
    }

    /// The x axis.
    #[must_use]
    pub fn x_axis(&self) -> Axis {
        self.x
    }

    /// The y axis.
    #[must_use]
    pub fn y_axis(&self) -> Axis {
        self.y
    }

    /// The z axis.
    #[must_use]
    pub fn z_axis(&self) -> Axis {
        self.z
    }

    #[inline]
    fn flat(&self, ix: usize, iy: usize, iz: usize) -> usize {
        (ix * self.y.bins() + iy) * self.z.bins() + iz
    }

    /// Adds `weight` at `(x, y, z)`; out-of-range values are dropped.
    pub fn fill(&mut self, x: f64, y: f64, z: f64, weight: f64) {
        if let (Some(ix), Some(iy), Some(iz)) =
            (self.x.index(x), self.y.index(y), self.z.index(z))
        {
            let i = self.flat(ix, iy, iz);
            self.data[i] += weight;
            self.entries += 1;
        }
    }

    /// Content of bin `(ix, iy, iz)`.
    #[must_use]
    pub fn bin(&self, ix: usize, iy: usize, iz: usize) -> f64 {
        self.data[self.flat(ix, iy, iz)]
    }

    /// Number of in-range fills.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of all bin contents.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Adds another histogram's contents into this one.
    ///
    /// # Errors
    /// Returns [`Error::BinningMismatch`] if any axis differs.
    pub fn merge_from(&mut self, other: &Self) -> Result<()> {
        check_axes("x", self.x, other.x)?;
        check_axes("y", self.y, other.y)?;
        check_axes("z", self.z, other.z)?;
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            *dst += src;
        }
        self.entries += other.entries;
        Ok(())
    }

    /// Projects onto `plane` by summing out the remaining axis.
    ///
    /// The source is not mutated; each of the three projections can be
    /// taken independently from the same histogram.
    #[must_use]
    pub fn project(&self, plane: ProjectionPlane) -> Hist2D {
        self.project_window(plane, None)
    }

    /// Projects onto `plane`, keeping only summed-axis bins whose centers
    /// fall inside `window` (half-open). `None` keeps the full range.
    ///
    /// The window is applied as a read-only filter on the summed-out axis.
    /// The output's `entries` count always carries the source's fill
    /// count, windowed or not: per-bin fill counts are not tracked, so a
    /// window cannot apportion them. Weights are filtered exactly.
    #[must_use]
    pub fn project_window(&self, plane: ProjectionPlane, window: Option<(f64, f64)>) -> Hist2D {
        let (a_axis, b_axis, sum_axis) = match plane {
            ProjectionPlane::Xy => (self.x, self.y, self.z),
            ProjectionPlane::Xz => (self.x, self.z, self.y),
            ProjectionPlane::Yz => (self.y, self.z, self.x),
        };
        let keep = |i: usize| match window {
            None => true,
            Some((lo, hi)) => {
                let c = sum_axis.center(i);
                c >= lo && c < hi
            }
        };

        let mut out = Hist2D::new(a_axis, b_axis);
        for ix in 0..self.x.bins() {
            for iy in 0..self.y.bins() {
                for iz in 0..self.z.bins() {
                    let w = self.data[self.flat(ix, iy, iz)];
                    if w == 0.0 {
                        continue;
                    }
                    let (ia, ib, is) = match plane {
                        ProjectionPlane::Xy => (ix, iy, iz),
                        ProjectionPlane::Xz => (ix, iz, iy),
                        ProjectionPlane::Yz => (iy, iz, ix),
                    };
                    if keep(is) {
                        out.data[ia * out.y.bins() + ib] += w;
                    }
                }
            }
        }
        out.entries = self.entries;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_index() {
        let axis = Axis::new(10, 0.0, 10.0).unwrap();
        assert_eq!(axis.index(0.0), Some(0));
        assert_eq!(axis.index(9.999), Some(9));
        assert_eq!(axis.index(10.0), None);
        assert_eq!(axis.index(-0.001), None);
        assert_eq!(axis.index(f64::NAN), None);
        assert_relative_eq!(axis.center(0), 0.5);
    }

    #[test]
    fn test_axis_rejects_bad_ranges() {
        assert!(Axis::new(0, 0.0, 1.0).is_err());
        assert!(Axis::new(5, 1.0, 1.0).is_err());
        assert!(Axis::new(5, 2.0, 1.0).is_err());
        assert!(Axis::new(5, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_hist1d_fill_and_flow_discard() {
        let mut h = Hist1D::new(Axis::new(4, 0.0, 4.0).unwrap());
        h.fill(0.5, 1.0);
        h.fill(0.7, 2.0);
        h.fill(99.0, 5.0); // dropped
        assert_relative_eq!(h.bin(0), 3.0);
        assert_eq!(h.entries(), 2);
        assert_relative_eq!(h.total_weight(), 3.0);
    }

    #[test]
    fn test_hist2d_merge_checks_binning() {
        let ax = Axis::new(4, 0.0, 4.0).unwrap();
        let mut a = Hist2D::new(ax, ax);
        let b = Hist2D::new(ax, Axis::new(8, 0.0, 4.0).unwrap());
        assert!(a.merge_from(&b).is_err());

        let mut c = Hist2D::new(ax, ax);
        c.fill(1.5, 2.5, 3.0);
        a.fill(1.5, 2.5, 1.0);
        a.merge_from(&c).unwrap();
        assert_relative_eq!(a.bin(1, 2), 4.0);
    }

    #[test]
    fn test_hist3d_projections_preserve_total() {
        let ax = Axis::new(3, 0.0, 3.0).unwrap();
        let mut h = Hist3D::new(ax, ax, ax);
        h.fill(0.5, 1.5, 2.5, 1.0);
        h.fill(2.5, 1.5, 0.5, 2.0);
        h.fill(0.5, 0.5, 0.5, 4.0);

        for plane in [ProjectionPlane::Xy, ProjectionPlane::Xz, ProjectionPlane::Yz] {
            let p = h.project(plane);
            assert_relative_eq!(p.total_weight(), h.total_weight());
        }
        let xy = h.project(ProjectionPlane::Xy);
        assert_relative_eq!(xy.bin(0, 1), 1.0);
        assert_relative_eq!(xy.bin(2, 1), 2.0);
    }

    #[test]
    fn test_hist3d_windowed_projection_filters_summed_axis() {
        let ax = Axis::new(3, 0.0, 3.0).unwrap();
        let mut h = Hist3D::new(ax, ax, ax);
        h.fill(0.5, 0.5, 0.5, 1.0); // z bin 0
        h.fill(0.5, 0.5, 2.5, 7.0); // z bin 2

        let full = h.project(ProjectionPlane::Xy);
        assert_relative_eq!(full.bin(0, 0), 8.0);

        let early = h.project_window(ProjectionPlane::Xy, Some((0.0, 1.0)));
        assert_relative_eq!(early.bin(0, 0), 1.0);
        // Entries carry the source's fill count even under a window.
        assert_eq!(early.entries(), h.entries());

        // Source untouched.
        assert_relative_eq!(h.bin(0, 0, 2), 7.0);
    }
}
