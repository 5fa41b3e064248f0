//! Declarative track-number remapping between MSU types

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Contiguous block of track numbers moved by a fixed offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeShift {
    pub first: u32,
    pub last: u32,
    pub offset: i64,
}

impl RangeShift {
    fn apply(&self, number: u32) -> Option<u32> {
        if number < self.first || number > self.last {
            return None;
        }
        u32::try_from(i64::from(number) + self.offset).ok()
    }
}

/// Partial function from a source track number to a destination track number
///
/// `None` from [`TrackMapping::apply`] means the track has no counterpart and
/// is dropped by the conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackMapping {
    /// Every number maps to itself
    Identity,

    /// First matching range wins; numbers outside every range are dropped
    Shift { ranges: Vec<RangeShift> },

    /// Explicit source → destination pairs
    Table {
        #[serde(deserialize_with = "track_pairs")]
        pairs: BTreeMap<u32, u32>,
    },
}

/// Table pairs keyed by track number
///
/// Tagged enum content is buffered before it reaches this field, so JSON
/// object keys arrive as strings. Both string and integer keys are accepted.
fn track_pairs<'de, D>(deserializer: D) -> Result<BTreeMap<u32, u32>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_map(PairsVisitor)
}

struct TrackKey(u32);

impl<'de> Deserialize<'de> for TrackKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TrackKeyVisitor)
    }
}

struct TrackKeyVisitor;

impl<'de> Visitor<'de> for TrackKeyVisitor {
    type Value = TrackKey;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a track number")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<TrackKey, E> {
        u32::try_from(v)
            .map(TrackKey)
            .map_err(|_| E::custom(format!("track number {} out of range", v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<TrackKey, E> {
        u32::try_from(v)
            .map(TrackKey)
            .map_err(|_| E::custom(format!("track number {} out of range", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<TrackKey, E> {
        v.trim()
            .parse()
            .map(TrackKey)
            .map_err(|_| E::custom(format!("invalid track number {:?}", v)))
    }
}

struct PairsVisitor;

impl<'de> Visitor<'de> for PairsVisitor {
    type Value = BTreeMap<u32, u32>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of source to destination track numbers")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut pairs = BTreeMap::new();
        while let Some((TrackKey(from), to)) = access.next_entry::<TrackKey, u32>()? {
            pairs.insert(from, to);
        }
        Ok(pairs)
    }
}

impl TrackMapping {
    pub fn apply(&self, number: u32) -> Option<u32> {
        match self {
            TrackMapping::Identity => Some(number),
            TrackMapping::Shift { ranges } => ranges.iter().find_map(|r| r.apply(number)),
            TrackMapping::Table { pairs } => pairs.get(&number).copied(),
        }
    }
}

/// Resolved conversion for one (source, destination) MSU type pair
///
/// Transient: obtained from the registry for the duration of a conversion
/// and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remap {
    mapping: TrackMapping,
}

impl Remap {
    pub fn new(mapping: TrackMapping) -> Self {
        Self { mapping }
    }

    pub fn identity() -> Self {
        Self::new(TrackMapping::Identity)
    }

    /// Destination number for `number`, or `None` if the track is dropped
    pub fn apply(&self, number: u32) -> Option<u32> {
        self.mapping.apply(number)
    }
}
