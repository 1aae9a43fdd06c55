//! dsipm-core: Photon records and weighted histograms for dSiPM
//! digitization.
//!
//! This crate provides the foundational types shared by the digitization
//! engine: per-event photon batches in `SoA` layout and uniform-binned
//! 1D/2D/3D weighted histograms with flow-discard semantics and 3D→2D
//! projections.
//!

pub mod error;
pub mod histogram;
pub mod photon;

pub use error::{Error, Result};
pub use histogram::{Axis, Hist1D, Hist2D, Hist3D, ProjectionPlane};
pub use photon::{PhotonBatch, PhotonRecord};
