//! Geometric position correction for detected photons.
//!
//! Two steps, in order:
//! 1. Translate by a per-origin offset so every fiber's light lands in a
//!    common detector frame.
//! 2. Apply a piecewise radial "shrink toward center" nonlinearity to each
//!    coordinate independently, modeling the optical compression of
//!    large-radius photons.

use dsipm_core::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One step of the shrink table: positions with `|v| <= limit` are pulled
/// toward zero by `shift`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShrinkStep {
    /// Upper bound of the step, in corrected-frame units.
    pub limit: f64,
    /// Magnitude pulled toward zero within this step.
    pub shift: f64,
}

/// Piecewise odd shrink function evaluated per axis.
///
/// The table is ordered by strictly increasing `limit`; beyond the last
/// limit a saturation shift applies. An empty table with zero saturation
/// shift is the identity.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShrinkTable {
    steps: Vec<ShrinkStep>,
    saturation_shift: f64,
}

impl ShrinkTable {
    /// Builds a shrink table.
    ///
    /// # Errors
    /// Returns [`Error::NonMonotoneShrinkTable`] if the step limits are
    /// not strictly increasing.
    pub fn new(steps: Vec<ShrinkStep>, saturation_shift: f64) -> Result<Self> {
        for (i, pair) in steps.windows(2).enumerate() {
            if pair[1].limit <= pair[0].limit {
                return Err(Error::NonMonotoneShrinkTable(i + 1));
            }
        }
        Ok(Self {
            steps,
            saturation_shift,
        })
    }

    /// The identity table: `shrink(v) == v` everywhere.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Evaluates the shrink function at `v`.
    ///
    /// Odd by construction: `shrink(-v) == -shrink(v)`, and
    /// `shrink(0) == 0`.
    #[must_use]
    pub fn shrink(&self, v: f64) -> f64 {
        if v == 0.0 {
            // signum(0.0) is 1.0, which would smear the center bin.
            return 0.0;
        }
        let magnitude = v.abs();
        let shift = self
            .steps
            .iter()
            .find(|step| step.limit >= magnitude)
            .map_or(self.saturation_shift, |step| step.shift);
        v - v.signum() * shift
    }
}

/// Maps raw detector-local positions to corrected positions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeometryCorrector {
    shift_x: Vec<f64>,
    shift_y: Vec<f64>,
    shrink: ShrinkTable,
}

impl GeometryCorrector {
    /// Builds a corrector from per-origin offsets and a shrink table.
    ///
    /// # Errors
    /// Returns a `ConfigError` if the shift tables are empty or their
    /// lengths differ.
    pub fn new(shift_x: Vec<f64>, shift_y: Vec<f64>, shrink: ShrinkTable) -> Result<Self> {
        if shift_x.is_empty() || shift_x.len() != shift_y.len() {
            return Err(Error::ConfigError(format!(
                "origin shift tables must be non-empty and equal length ({} x, {} y)",
                shift_x.len(),
                shift_y.len()
            )));
        }
        Ok(Self {
            shift_x,
            shift_y,
            shrink,
        })
    }

    /// Number of configured origins.
    #[must_use]
    pub fn origins(&self) -> usize {
        self.shift_x.len()
    }

    /// Corrects a raw position for the given production origin.
    ///
    /// # Errors
    /// Returns [`Error::OriginOutOfRange`] if `origin` has no entry in the
    /// shift tables; this indicates a misconfigured geometry, not bad data.
    pub fn correct(&self, raw_x: f64, raw_y: f64, origin: usize) -> Result<(f64, f64)> {
        if origin >= self.shift_x.len() {
            return Err(Error::OriginOutOfRange {
                origin,
                table_size: self.shift_x.len(),
            });
        }
        let x = self.shrink.shrink(raw_x + self.shift_x[origin]);
        let y = self.shrink.shrink(raw_y + self.shift_y[origin]);
        Ok((x, y))
    }
}
