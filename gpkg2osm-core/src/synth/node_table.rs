use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;

use geo::Coord;

use super::SynthesisError;

/// Fixed-point scale of deduplication keys: 7 decimal digits, about 1.1 cm at
/// the equator.
pub const COORDINATE_SCALE: f64 = 1.0e7;

/// A coordinate rounded to 1e-7 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey {
    /// Longitude in 1e-7 degrees.
    pub lon: i32,
    /// Latitude in 1e-7 degrees.
    pub lat: i32,
}

impl CoordKey {
    /// Round a coordinate to its key.
    ///
    /// Non-finite values and values whose scaled form does not fit an `i32`
    /// (beyond roughly ±214.7 degrees) overflow.
    pub fn from_coord(coord: Coord<f64>) -> Result<Self, SynthesisError> {
        match (scale(coord.x), scale(coord.y)) {
            (Some(lon), Some(lat)) => Ok(Self { lon, lat }),
            _ => Err(SynthesisError::CoordinateOverflow {
                x: coord.x,
                y: coord.y,
            }),
        }
    }

    /// The snapped position this key stands for.
    #[must_use]
    pub fn to_coord(self) -> Coord<f64> {
        Coord {
            x: f64::from(self.lon) / COORDINATE_SCALE,
            y: f64::from(self.lat) / COORDINATE_SCALE,
        }
    }
}

fn scale(value: f64) -> Option<i32> {
    let scaled = (value * COORDINATE_SCALE).round();
    let in_range = scaled.is_finite()
        && scaled >= f64::from(i32::MIN)
        && scaled <= f64::from(i32::MAX);
    in_range.then_some(scaled as i32)
}

/// Maps rounded coordinates to the node allocated for them.
///
/// At most one node exists per key: the first writer wins. Keys also record
/// whether a point feature has claimed the node, tagged or not.
#[derive(Debug, Default, Clone)]
pub struct NodeTable {
    ids: HashMap<CoordKey, u64>,
    claimed: HashSet<CoordKey>,
}

impl NodeTable {
    /// Node already allocated for `key`, if any.
    #[must_use]
    pub fn get(&self, key: CoordKey) -> Option<u64> {
        self.ids.get(&key).copied()
    }

    /// Record `id` for `key` unless a node exists already; returns the id that
    /// owns the key afterwards.
    pub fn insert(&mut self, key: CoordKey, id: u64) -> u64 {
        match self.ids.entry(key) {
            Entry::Occupied(existing) => *existing.get(),
            Entry::Vacant(slot) => *slot.insert(id),
        }
    }

    /// Mark `key` as owned by a point feature. Returns `false` when an
    /// earlier point already owns it.
    pub fn claim(&mut self, key: CoordKey) -> bool {
        self.claimed.insert(key)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no node has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
