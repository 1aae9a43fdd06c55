//! Photon records and the per-event batch (`SoA`) layout.
//!
//! One `PhotonBatch` holds every detected optical photon of a single
//! acquisition event in parallel column vectors. Batches are transient:
//! built once per event, digitized, then discarded.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single detected photon, as produced by upstream transport.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhotonRecord {
    /// Raw detector-local x position (before geometry correction).
    pub raw_x: f64,
    /// Raw detector-local y position (before geometry correction).
    pub raw_y: f64,
    /// Depth at which the photon was produced.
    pub z_produced: f64,
    /// Depth at which the photon terminated; > 0 means it reached the face.
    pub z_final: f64,
    /// Arrival time.
    pub time: f64,
    /// Index of the physical fiber that produced the photon.
    pub origin: u8,
    /// Whether the photon's wave mode counts toward detection.
    pub selected: bool,
    /// Statistical weight.
    pub weight: f64,
}

/// A batch of photons for one event, stored in Structure of Arrays
/// (`SoA`) format.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhotonBatch {
    /// Columnar storage for raw X positions.
    pub raw_x: Vec<f64>,
    /// Columnar storage for raw Y positions.
    pub raw_y: Vec<f64>,
    /// Columnar storage for production depths.
    pub z_produced: Vec<f64>,
    /// Columnar storage for final depths.
    pub z_final: Vec<f64>,
    /// Columnar storage for arrival times.
    pub time: Vec<f64>,
    /// Columnar storage for origin (fiber) indices.
    pub origin: Vec<u8>,
    /// Columnar storage for the mode-selection flag.
    pub selected: Vec<bool>,
    /// Columnar storage for statistical weights.
    pub weight: Vec<f64>,
}

impl PhotonBatch {
    /// Creates a new empty batch with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw_x: Vec::with_capacity(capacity),
            raw_y: Vec::with_capacity(capacity),
            z_produced: Vec::with_capacity(capacity),
            z_final: Vec::with_capacity(capacity),
            time: Vec::with_capacity(capacity),
            origin: Vec::with_capacity(capacity),
            selected: Vec::with_capacity(capacity),
            weight: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of photons in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw_x.len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw_x.is_empty()
    }

    /// Clears all columns.
    pub fn clear(&mut self) {
        self.raw_x.clear();
        self.raw_y.clear();
        self.z_produced.clear();
        self.z_final.clear();
        self.time.clear();
        self.origin.clear();
        self.selected.clear();
        self.weight.clear();
    }

    /// Pushes a single photon record into the batch.
    pub fn push(&mut self, record: PhotonRecord) {
        self.raw_x.push(record.raw_x);
        self.raw_y.push(record.raw_y);
        self.z_produced.push(record.z_produced);
        self.z_final.push(record.z_final);
        self.time.push(record.time);
        self.origin.push(record.origin);
        self.selected.push(record.selected);
        self.weight.push(record.weight);
    }

    /// Returns the record at index `i`, or `None` past the end.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<PhotonRecord> {
        if i >= self.len() {
            return None;
        }
        Some(PhotonRecord {
            raw_x: self.raw_x[i],
            raw_y: self.raw_y[i],
            z_produced: self.z_produced[i],
            z_final: self.z_final[i],
            time: self.time[i],
            origin: self.origin[i],
            selected: self.selected[i],
            weight: self.weight[i],
        })
    }

    /// Returns the indices of the batch sorted ascending by arrival time.
    ///
    /// The sort is stable: photons with equal timestamps keep their input
    /// order, which makes first-hit assignment deterministic. Times are
    /// compared with the IEEE total order, so NaN times sort after every
    /// finite time and never perturb the ordering of the finite ones
    /// (such records are rejected downstream anyway).
    #[must_use]
    pub fn time_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.time[a].total_cmp(&self.time[b]));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photon(t: f64) -> PhotonRecord {
        PhotonRecord {
            raw_x: 0.0,
            raw_y: 0.0,
            z_produced: 10.0,
            z_final: 1.0,
            time: t,
            origin: 0,
            selected: true,
            weight: 1.0,
        }
    }

    #[test]
    fn test_batch_operations() {
        let mut batch = PhotonBatch::with_capacity(4);
        assert!(batch.is_empty());

        batch.push(photon(5.0));
        batch.push(photon(3.0));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get(1).unwrap().time, 3.0);
        assert!(batch.get(2).is_none());

        batch.clear();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_time_order_is_ascending() {
        let mut batch = PhotonBatch::default();
        for t in [9.0, 1.0, 4.0, 2.5] {
            batch.push(photon(t));
        }
        assert_eq!(batch.time_order(), vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_time_order_puts_nan_last() {
        let mut batch = PhotonBatch::default();
        for t in [f64::NAN, 5.0, f64::NAN, 3.0] {
            batch.push(photon(t));
        }
        // Finite times ascend first; NaNs trail in input order.
        assert_eq!(batch.time_order(), vec![3, 1, 0, 2]);
    }

    #[test]
    fn test_time_order_finite_ascending_despite_nan_noise() {
        let mut batch = PhotonBatch::default();
        let mut seed = 41_u64;
        for i in 0..400 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let t = if i % 3 == 0 {
                f64::NAN
            } else {
                f64::from(u32::try_from(seed >> 40).unwrap())
            };
            batch.push(photon(t));
        }
        let mut prev = f64::NEG_INFINITY;
        for i in batch.time_order() {
            let t = batch.time[i];
            if t.is_nan() {
                continue;
            }
            assert!(t >= prev, "finite times out of order: {prev} then {t}");
            prev = t;
        }
    }

    #[test]
    fn test_time_order_stable_on_ties() {
        let mut batch = PhotonBatch::default();
        for t in [7.0, 7.0, 2.0, 7.0] {
            batch.push(photon(t));
        }
        // Equal timestamps keep input order.
        assert_eq!(batch.time_order(), vec![2, 0, 1, 3]);
    }
}
