//! Binomial-ratio detection-efficiency estimation.
//!
//! Divides a first-hit histogram by its all-hit partner bin by bin, with
//! the binomial standard-error approximation on each ratio. Mirrors the
//! behavior of `TH1::Divide(num, den, 1, 1, "B")` with one deliberate
//! quirk kept from the reference analysis: bins with a positive
//! denominator but zero numerator get a small nonzero floor value rather
//! than a hard zero, so ratio plots and fits never see empty bins. Bins
//! with zero denominator are exactly zero.

use dsipm_core::error::{Error, Result};
use dsipm_core::histogram::{Axis, Hist2D, Hist3D, ProjectionPlane};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default floor value for positive-denominator, zero-numerator bins.
pub const DEFAULT_EFFICIENCY_FLOOR: f64 = 0.001;

/// A per-bin efficiency map with uncertainties; read-only once computed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EfficiencyGrid {
    x: Axis,
    y: Axis,
    values: Vec<f64>,
    errors: Vec<f64>,
}

impl EfficiencyGrid {
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

    /// Efficiency value in bin `(ix, iy)`.
    #[must_use]
    pub fn value(&self, ix: usize, iy: usize) -> f64 {
        self.values[ix * self.y.bins() + iy]
    }

    /// Uncertainty in bin `(ix, iy)`.
    #[must_use]
    pub fn error(&self, ix: usize, iy: usize) -> f64 {
        self.errors[ix * self.y.bins() + iy]
    }

    /// Flat view of the values, row-major in x.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Flat view of the uncertainties, row-major in x.
    #[must_use]
    pub fn errors(&self) -> &[f64] {
        &self.errors
    }
}

/// Computes per-bin ratio efficiencies with binomial errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficiencyEstimator {
    floor: f64,
}

impl Default for EfficiencyEstimator {
    fn default() -> Self {
        Self {
            floor: DEFAULT_EFFICIENCY_FLOOR,
        }
    }
}

impl EfficiencyEstimator {
    /// Creates an estimator with the default floor constant.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the zero-numerator floor value.
    #[must_use]
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    /// Divides `num` by `den` bin by bin.
    ///
    /// Per-bin policy:
    /// - `den <= 0`: value 0, uncertainty 0 (undefined region, zeroed).
    /// - `den > 0, num == 0`: value = floor constant, uncertainty 0.
    /// - otherwise: value = num/den, uncertainty =
    ///   `sqrt(value * (1 - value) / den)`.
    ///
    /// # Errors
    /// [`Error::BinningMismatch`] if the histograms' axes differ;
    /// [`Error::NumeratorExceedsDenominator`] if any bin has `num > den`,
    /// which indicates an upstream accumulation bug and is never clamped.
    pub fn estimate(&self, num: &Hist2D, den: &Hist2D) -> Result<EfficiencyGrid> {
        if !num.same_binning(den) {
            return Err(Error::BinningMismatch(
                "efficiency numerator and denominator".to_string(),
            ));
        }

        let n_bins = num.contents().len();
        let mut values = vec![0.0; n_bins];
        let mut errors = vec![0.0; n_bins];
        for bin in 0..n_bins {
            let n = num.contents()[bin];
            let d = den.contents()[bin];
            if d <= 0.0 {
                continue;
            }
            if n > d {
                return Err(Error::NumeratorExceedsDenominator { bin, num: n, den: d });
            }
            if n == 0.0 {
                values[bin] = self.floor;
            } else {
                let eff = n / d;
                values[bin] = eff;
                errors[bin] = (eff * (1.0 - eff) / d).sqrt();
            }
        }

        Ok(EfficiencyGrid {
            x: num.x_axis(),
            y: num.y_axis(),
            values,
            errors,
        })
    }

    /// Projects a 3D one-hit/all pair onto `plane`, then estimates.
    ///
    /// # Errors
    /// Same as [`EfficiencyEstimator::estimate`].
    pub fn estimate_projected(
        &self,
        num: &Hist3D,
        den: &Hist3D,
        plane: ProjectionPlane,
    ) -> Result<EfficiencyGrid> {
        self.estimate(&num.project(plane), &den.project(plane))
    }

    /// Estimates all three pairwise projections of a 3D pair.
    ///
    /// # Errors
    /// Same as [`EfficiencyEstimator::estimate`].
    pub fn estimate_all_projections(
        &self,
        num: &Hist3D,
        den: &Hist3D,
    ) -> Result<[(ProjectionPlane, EfficiencyGrid); 3]> {
        Ok([
            (
                ProjectionPlane::Xy,
                self.estimate_projected(num, den, ProjectionPlane::Xy)?,
            ),
            (
                ProjectionPlane::Xz,
                self.estimate_projected(num, den, ProjectionPlane::Xz)?,
            ),
            (
                ProjectionPlane::Yz,
                self.estimate_projected(num, den, ProjectionPlane::Yz)?,
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pair(fills: &[(f64, f64, f64, f64)]) -> (Hist2D, Hist2D) {
        // fills: (x, y, num_weight, den_weight)
        let ax = Axis::new(4, 0.0, 4.0).unwrap();
        let mut num = Hist2D::new(ax, ax);
        let mut den = Hist2D::new(ax, ax);
        for &(x, y, nw, dw) in fills {
            num.fill(x, y, nw);
            den.fill(x, y, dw);
        }
        (num, den)
    }

    #[test]
    fn test_ratio_and_binomial_error() {
        let (num, den) = pair(&[(0.5, 0.5, 4.0, 16.0)]);
        let eff = EfficiencyEstimator::new().estimate(&num, &den).unwrap();
        assert_relative_eq!(eff.value(0, 0), 0.25);
        assert_relative_eq!(eff.error(0, 0), (0.25_f64 * 0.75 / 16.0).sqrt());
    }

    #[test]
    fn test_zero_denominator_is_exact_zero() {
        let (num, den) = pair(&[]);
        let eff = EfficiencyEstimator::new().estimate(&num, &den).unwrap();
        assert_relative_eq!(eff.value(1, 1), 0.0);
        assert_relative_eq!(eff.error(1, 1), 0.0);
    }

    #[test]
    fn test_zero_numerator_gets_floor() {
        let (num, den) = pair(&[(1.5, 1.5, 0.0, 10.0)]);
        let eff = EfficiencyEstimator::new().estimate(&num, &den).unwrap();
        assert_relative_eq!(eff.value(1, 1), DEFAULT_EFFICIENCY_FLOOR);
        assert_relative_eq!(eff.error(1, 1), 0.0);
    }

    #[test]
    fn test_full_efficiency_has_zero_error() {
        let (num, den) = pair(&[(2.5, 0.5, 10.0, 10.0)]);
        let eff = EfficiencyEstimator::new().estimate(&num, &den).unwrap();
        assert_relative_eq!(eff.value(2, 0), 1.0);
        assert_relative_eq!(eff.error(2, 0), 0.0);
    }

    #[test]
    fn test_numerator_above_denominator_signaled() {
        let (num, den) = pair(&[(0.5, 0.5, 5.0, 2.0)]);
        let result = EfficiencyEstimator::new().estimate(&num, &den);
        assert!(matches!(
            result,
            Err(Error::NumeratorExceedsDenominator { .. })
        ));
    }

    #[test]
    fn test_binning_mismatch_rejected() {
        let ax = Axis::new(4, 0.0, 4.0).unwrap();
        let num = Hist2D::new(ax, ax);
        let den = Hist2D::new(ax, Axis::new(8, 0.0, 4.0).unwrap());
        assert!(EfficiencyEstimator::new().estimate(&num, &den).is_err());
    }

    #[test]
    fn test_custom_floor() {
        let (num, den) = pair(&[(0.5, 0.5, 0.0, 3.0)]);
        let eff = EfficiencyEstimator::new()
            .with_floor(1e-6)
            .estimate(&num, &den)
            .unwrap();
        assert_relative_eq!(eff.value(0, 0), 1e-6);
    }
}
