//! Error types for dsipm-core.

use thiserror::Error;

/// Result type alias for dsipm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for dsipm operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Axis constructed with no bins or an inverted range.
    #[error("invalid axis: {bins} bins over [{low}, {high})")]
    InvalidAxis {
        /// Requested bin count.
        bins: usize,
        /// Lower edge.
        low: f64,
        /// Upper edge.
        high: f64,
    },

    /// Two histograms were combined but their binning differs.
    #[error("histogram binning mismatch: {0}")]
    BinningMismatch(String),

    /// Photon origin index outside the configured shift table.
    #[error("origin index {origin} outside shift table of size {table_size}")]
    OriginOutOfRange {
        /// Offending origin index.
        origin: usize,
        /// Number of configured origins.
        table_size: usize,
    },

    /// Shrink table limits are not strictly increasing.
    #[error("shrink table limits not strictly increasing at entry {0}")]
    NonMonotoneShrinkTable(usize),

    /// First-hit count exceeds the all-hit count in an efficiency bin.
    /// Indicates an upstream accumulation bug.
    #[error("efficiency numerator {num} exceeds denominator {den} in bin {bin}")]
    NumeratorExceedsDenominator {
        /// Flat bin index.
        bin: usize,
        /// Numerator (first-hit) content.
        num: f64,
        /// Denominator (all-hit) content.
        den: f64,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
