//! Fan-out over the configured channel resolutions.

use crate::channel::{ChannelConfig, ChannelGrid, DigitizedPhoton};
use dsipm_core::error::{Error, Result};

/// An ordered set of independent [`ChannelGrid`]s, one per pitch, that all
/// consume the same photon stream.
///
/// Resolutions never interact: iteration order has no effect on any
/// grid's final histograms.
#[derive(Debug, Clone)]
pub struct MultiResolutionSet {
    grids: Vec<ChannelGrid>,
}

impl MultiResolutionSet {
    /// Builds one grid per config, preserving order.
    ///
    /// # Errors
    /// Returns a `ConfigError` on duplicate resolution tags, or the grid
    /// constructor's error for degenerate axes.
    pub fn new(configs: Vec<ChannelConfig>) -> Result<Self> {
        let mut grids = Vec::with_capacity(configs.len());
        for config in configs {
            if grids.iter().any(|g: &ChannelGrid| g.tag() == config.tag) {
                return Err(Error::ConfigError(format!(
                    "duplicate resolution tag '{}'",
                    config.tag
                )));
            }
            grids.push(ChannelGrid::new(config)?);
        }
        Ok(Self { grids })
    }

    /// Number of resolutions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    /// True if no resolutions are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// Iterates the grids in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelGrid> {
        self.grids.iter()
    }

    /// Looks a grid up by its resolution tag.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&ChannelGrid> {
        self.grids.iter().find(|g| g.tag() == tag)
    }

    /// Starts a new event on every grid.
    pub fn begin_event(&mut self) {
        for grid in &mut self.grids {
            grid.begin_event();
        }
    }

    /// Dispatches one valid, geometry-corrected photon to every grid.
    pub fn register(&mut self, photon: &DigitizedPhoton) {
        for grid in &mut self.grids {
            grid.register(photon);
        }
    }

    /// Ends the event on every grid.
    pub fn end_event(&mut self) {
        for grid in &mut self.grids {
            grid.end_event();
        }
    }

    /// Folds another set's persistent accumulators into this one.
    ///
    /// # Errors
    /// Returns a `ConfigError` if the sets were built from different
    /// resolution lists.
    pub fn merge_from(&mut self, other: &Self) -> Result<()> {
        if self.grids.len() != other.grids.len() {
            return Err(Error::ConfigError(format!(
                "cannot merge resolution sets of size {} and {}",
                self.grids.len(),
                other.grids.len()
            )));
        }
        for (dst, src) in self.grids.iter_mut().zip(&other.grids) {
            dst.merge_from(src)?;
        }
        Ok(())
    }
}
