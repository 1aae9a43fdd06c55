//! dsipm-digitizer: Multi-resolution first-hit digitization and
//! efficiency estimation.
//!
//! The engine consumes per-event photon batches and accumulates, for many
//! channel pitches at once:
//! - **all** histograms over every valid photon,
//! - **one-hit** histograms modeling a saturating (binary) SPAD cell that
//!   registers at most one count per channel per event,
//! - the photons-per-channel occupancy distribution,
//!
//! and derives per-bin detection efficiencies with binomial uncertainties
//! from the one-hit/all ratio.
//!
#![warn(missing_docs)]

mod channel;
mod digitizer;
mod efficiency;
mod geometry;
mod resolution;

pub use channel::{ChannelConfig, ChannelGrid, DigitizedPhoton};
pub use digitizer::{
    process_events_parallel, DigitizerConfig, EventDigitizer, EventSummary,
};
pub use efficiency::{
    EfficiencyEstimator, EfficiencyGrid, DEFAULT_EFFICIENCY_FLOOR,
};
pub use geometry::{GeometryCorrector, ShrinkStep, ShrinkTable};
pub use resolution::MultiResolutionSet;

// Re-export core types used throughout the public API.
pub use dsipm_core::histogram::{Axis, Hist1D, Hist2D, Hist3D, ProjectionPlane};
pub use dsipm_core::photon::{PhotonBatch, PhotonRecord};
pub use dsipm_core::{Error, Result};
