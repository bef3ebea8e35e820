//! # Distribution Module
//!
//! Percentage distributions that sum to 100 and the proportional
//! redistribution applied when a single share is changed
//!
//! ## Key Components
//! - [`Percentage`] - Bounded 0-100 share
//! - [`WeightedCollection`] - Ordered list of keyed shares
//! - [`redistribute`] - Set one share and rescale the others

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const FULL_SHARE: u8 = 100;

/// A whole-number share between 0 and 100 inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);
    pub const FULL: Percentage = Percentage(FULL_SHARE);

    pub fn new(value: u8) -> Option<Self> {
        (value <= FULL_SHARE).then_some(Self(value))
    }

    /// Clamp an arbitrary value into range, rounding half away from zero.
    /// NaN maps to zero.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.round().clamp(0.0, f64::from(FULL_SHARE)) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_fraction(self) -> f64 {
        f64::from(self.0) / f64::from(FULL_SHARE)
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Percentage::new(value).ok_or_else(|| {
            serde::de::Error::custom(format!("percentage {} is outside 0-100", value))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedEntry {
    pub key: String,
    pub percentage: Percentage,
}

impl WeightedEntry {
    pub fn new(key: impl Into<String>, percentage: Percentage) -> Self {
        Self {
            key: key.into(),
            percentage,
        }
    }
}

/// Ordered shares, e.g. models within a provider or token types within a model
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct WeightedCollection {
    entries: Vec<WeightedEntry>,
}

impl<'de> Deserialize<'de> for WeightedCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<WeightedEntry>::deserialize(deserializer)?;
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.key.as_str()) {
                return Err(serde::de::Error::custom(format!(
                    "duplicate distribution key '{}'",
                    entry.key
                )));
            }
        }
        Ok(Self { entries })
    }
}

impl WeightedCollection {
    pub fn new(entries: Vec<WeightedEntry>) -> Self {
        Self { entries }
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Percentage)>,
        K: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(key, percentage)| WeightedEntry::new(key, percentage))
            .collect()
    }

    /// First key takes the full share, the rest start at zero
    pub fn primary_first<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        keys.into_iter()
            .enumerate()
            .map(|(i, key)| {
                let share = if i == 0 { Percentage::FULL } else { Percentage::ZERO };
                WeightedEntry::new(key, share)
            })
            .collect()
    }

    /// Split 100 evenly; the remainder goes one point at a time to the leading keys
    pub fn even_split<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Self::default();
        }

        let full = usize::from(FULL_SHARE);
        let base = full / keys.len();
        let remainder = full % keys.len();

        keys.into_iter()
            .enumerate()
            .map(|(i, key)| {
                let share = if i < remainder { base + 1 } else { base };
                WeightedEntry::new(key, Percentage(share as u8))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedEntry> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<Percentage> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.percentage)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn total(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| u32::from(e.percentage.value()))
            .sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total() == u32::from(FULL_SHARE)
    }
}

impl FromIterator<WeightedEntry> for WeightedCollection {
    fn from_iter<T: IntoIterator<Item = WeightedEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a WeightedCollection {
    type Item = &'a WeightedEntry;
    type IntoIter = std::slice::Iter<'a, WeightedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Set `target_key` to `new_value` and rescale every other entry so the
/// collection sums to 100 again, keeping their relative proportions.
///
/// Edge behaviour:
/// - only the first entry named `target_key` is set
/// - empty collections and unknown keys come back unchanged
/// - `new_value` is clamped to 0-100
/// - a single-entry collection stays pinned at 100
/// - if every other entry is already at zero, the target takes `new_value`
///   and the others stay at zero, so the sum is not forced back to 100
/// - rounding drift lands on the first non-target entry, spilling over to
///   the next one only if that entry would leave 0-100
pub fn redistribute(
    collection: &WeightedCollection,
    target_key: &str,
    new_value: f64,
) -> WeightedCollection {
    if collection.is_empty() {
        return collection.clone();
    }

    let Some(target_index) = collection.entries.iter().position(|e| e.key == target_key) else {
        warn!(
            "No entry named '{}' in distribution, leaving it unchanged",
            target_key
        );
        return collection.clone();
    };

    let target_value = Percentage::clamped(new_value);
    if f64::from(target_value.value()) != new_value {
        warn!("Requested share {} adjusted to {}", new_value, target_value);
    }

    let mut entries = collection.entries.clone();

    if entries.len() == 1 {
        debug!("'{}' is the only entry, keeping it at 100%", target_key);
        entries[0].percentage = Percentage::FULL;
        return WeightedCollection { entries };
    }

    // Only the first entry with the key is the target; any later namesake is rescaled
    let others_total: u32 = entries
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != target_index)
        .map(|(_, e)| u32::from(e.percentage.value()))
        .sum();

    if others_total == 0 {
        debug!(
            "Other entries hold no share, setting '{}' to {} without rebalancing",
            target_key, target_value
        );
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.percentage = if i == target_index {
                target_value
            } else {
                Percentage::ZERO
            };
        }
        return WeightedCollection { entries };
    }

    let adjustment_factor =
        f64::from(FULL_SHARE - target_value.value()) / f64::from(others_total);

    for (i, entry) in entries.iter_mut().enumerate() {
        entry.percentage = if i == target_index {
            target_value
        } else {
            Percentage::clamped(f64::from(entry.percentage.value()) * adjustment_factor)
        };
    }

    let total: i32 = entries
        .iter()
        .map(|e| i32::from(e.percentage.value()))
        .sum();
    let drift = i32::from(FULL_SHARE) - total;

    if drift != 0 {
        debug!("Correcting rounding drift of {} after setting '{}'", drift, target_key);
        absorb_drift(&mut entries, target_index, drift);
    }

    WeightedCollection { entries }
}

fn absorb_drift(entries: &mut [WeightedEntry], target_index: usize, mut drift: i32) {
    for (_, entry) in entries
        .iter_mut()
        .enumerate()
        .filter(|(i, _)| *i != target_index)
    {
        if drift == 0 {
            break;
        }
        let current = i32::from(entry.percentage.value());
        let adjusted = (current + drift).clamp(0, i32::from(FULL_SHARE));
        drift -= adjusted - current;
        entry.percentage = Percentage(adjusted as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(value: u8) -> Percentage {
        Percentage::new(value).unwrap()
    }

    fn collection(pairs: &[(&str, u8)]) -> WeightedCollection {
        WeightedCollection::from_pairs(pairs.iter().map(|(k, v)| (*k, pct(*v))))
    }

    fn values(collection: &WeightedCollection) -> Vec<u8> {
        collection.iter().map(|e| e.percentage.value()).collect()
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(Percentage::new(100).is_some());
        assert!(Percentage::new(101).is_none());
        assert_eq!(Percentage::clamped(150.0), Percentage::FULL);
        assert_eq!(Percentage::clamped(-3.0), Percentage::ZERO);
        assert_eq!(Percentage::clamped(f64::NAN), Percentage::ZERO);
        assert_eq!(Percentage::clamped(24.5).value(), 25);
        assert_eq!(Percentage::clamped(24.49).value(), 24);
    }

    #[test]
    fn test_percentage_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Percentage>("40").is_ok());
        assert!(serde_json::from_str::<Percentage>("140").is_err());
        assert!(serde_json::from_str::<Percentage>("-1").is_err());
    }

    #[test]
    fn test_collection_serializes_as_list() {
        let dist = collection(&[("input", 40), ("output", 60)]);
        let json = serde_json::to_string(&dist).unwrap();
        assert_eq!(
            json,
            r#"[{"key":"input","percentage":40},{"key":"output","percentage":60}]"#
        );
        let back: WeightedCollection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dist);
    }

    #[test]
    fn test_collection_rejects_repeated_keys_json() {
        let json = r#"[{"key":"A","percentage":30},{"key":"A","percentage":20},{"key":"B","percentage":50}]"#;
        let err = serde_json::from_str::<WeightedCollection>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate distribution key 'A'"));

        let json = r#"[{"key":"A","percentage":30},{"key":"B","percentage":140}]"#;
        assert!(serde_json::from_str::<WeightedCollection>(json).is_err());
    }

    #[test]
    fn test_repeated_key_only_targets_first_entry() {
        let dist = WeightedCollection::new(vec![
            WeightedEntry::new("A", pct(30)),
            WeightedEntry::new("A", pct(20)),
            WeightedEntry::new("B", pct(50)),
        ]);
        let updated = redistribute(&dist, "A", 60.0);
        // 20 * 40/70 = 11.4, 50 * 40/70 = 28.6
        assert_eq!(values(&updated), vec![60, 11, 29]);
        assert!(updated.is_balanced());
    }

    #[test]
    fn test_default_distributions() {
        let models = WeightedCollection::primary_first(["GPT-4.1", "GPT-4.1 mini", "GPT-3.5 Turbo"]);
        assert_eq!(values(&models), vec![100, 0, 0]);

        let tokens = WeightedCollection::even_split(["input", "output", "cached"]);
        assert_eq!(values(&tokens), vec![34, 33, 33]);
        assert!(tokens.is_balanced());

        let seven = WeightedCollection::even_split((0..7).map(|i| format!("t{}", i)));
        assert_eq!(values(&seven), vec![15, 15, 14, 14, 14, 14, 14]);

        assert!(WeightedCollection::even_split(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_normal_redistribution() {
        let dist = collection(&[("A", 50), ("B", 30), ("C", 20)]);
        let updated = redistribute(&dist, "A", 80.0);
        assert_eq!(updated, collection(&[("A", 80), ("B", 12), ("C", 8)]));
    }

    #[test]
    fn test_rounding_without_drift() {
        let dist = collection(&[("A", 33), ("B", 33), ("C", 34)]);
        let updated = redistribute(&dist, "A", 50.0);
        assert_eq!(values(&updated), vec![50, 25, 25]);
    }

    #[test]
    fn test_negative_drift_lands_on_first_other() {
        // 1.8, 3.6 and 3.6 all round up, one point too many
        let dist = collection(&[("A", 95), ("B", 1), ("C", 2), ("D", 2)]);
        let updated = redistribute(&dist, "A", 91.0);
        assert_eq!(values(&updated), vec![91, 1, 4, 4]);
    }

    #[test]
    fn test_positive_drift_lands_on_first_other() {
        let dist = collection(&[("A", 97), ("B", 1), ("C", 1), ("D", 1)]);
        let updated = redistribute(&dist, "A", 99.0);
        assert_eq!(values(&updated), vec![99, 1, 0, 0]);

        let dist = collection(&[("A", 95), ("B", 1), ("C", 2), ("D", 2)]);
        let updated = redistribute(&dist, "A", 94.0);
        assert_eq!(values(&updated), vec![94, 2, 2, 2]);
    }

    #[test]
    fn test_drift_follows_collection_order_around_target() {
        let dist = collection(&[("B", 1), ("C", 2), ("D", 2), ("A", 95)]);
        let updated = redistribute(&dist, "A", 91.0);
        assert_eq!(values(&updated), vec![1, 4, 4, 91]);
    }

    #[test]
    fn test_drift_spills_over_when_first_other_hits_zero() {
        // B rounds to 0 while C..F round up, leaving a drift of -1
        let dist = collection(&[("A", 87), ("B", 1), ("C", 3), ("D", 3), ("E", 3), ("F", 3)]);
        let updated = redistribute(&dist, "A", 97.0);
        assert_eq!(values(&updated), vec![97, 0, 0, 1, 1, 1]);
        assert!(updated.is_balanced());
    }

    #[test]
    fn test_degenerate_others_keep_zero() {
        let dist = collection(&[("A", 100), ("B", 0), ("C", 0)]);
        let updated = redistribute(&dist, "A", 40.0);
        assert_eq!(values(&updated), vec![40, 0, 0]);
        assert_eq!(updated.total(), 40);
    }

    #[test]
    fn test_raising_a_zero_entry_scales_the_rest() {
        let dist = collection(&[("A", 100), ("B", 0), ("C", 0)]);
        let updated = redistribute(&dist, "B", 40.0);
        assert_eq!(values(&updated), vec![60, 40, 0]);
    }

    #[test]
    fn test_single_entry_is_pinned() {
        let dist = collection(&[("A", 100)]);
        assert_eq!(redistribute(&dist, "A", 60.0), dist);
        assert_eq!(redistribute(&dist, "A", 0.0), dist);
    }

    #[test]
    fn test_unknown_key_and_empty_are_noops() {
        let dist = collection(&[("A", 50), ("B", 50)]);
        assert_eq!(redistribute(&dist, "Z", 10.0), dist);

        let empty = WeightedCollection::default();
        assert_eq!(redistribute(&empty, "A", 10.0), empty);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let dist = collection(&[("A", 50), ("B", 30), ("C", 20)]);
        assert_eq!(values(&redistribute(&dist, "A", 150.0)), vec![100, 0, 0]);
        assert_eq!(values(&redistribute(&dist, "A", -5.0)), vec![0, 60, 40]);
        assert_eq!(values(&redistribute(&dist, "A", f64::NAN)), vec![0, 60, 40]);
    }

    #[test]
    fn test_sum_and_target_hold_across_inputs() {
        let bases = [
            collection(&[("A", 50), ("B", 30), ("C", 20)]),
            collection(&[("A", 33), ("B", 33), ("C", 34)]),
            collection(&[("A", 1), ("B", 1), ("C", 1), ("D", 97)]),
            collection(&[("A", 10), ("B", 15), ("C", 20), ("D", 25), ("E", 30)]),
            collection(&[("A", 87), ("B", 1), ("C", 3), ("D", 3), ("E", 3), ("F", 3)]),
            collection(&[("A", 0), ("B", 100)]),
        ];

        for base in &bases {
            for key in base.keys() {
                for value in 0..=100u8 {
                    let updated = redistribute(base, key, f64::from(value));
                    assert_eq!(updated.get(key), Some(pct(value)));
                    assert_eq!(updated.keys().collect::<Vec<_>>(), base.keys().collect::<Vec<_>>());

                    let others_total = base.total() - u32::from(base.get(key).unwrap().value());
                    if others_total > 0 {
                        assert!(updated.is_balanced(), "{:?} -> {:?}", base, updated);
                    }
                }
            }
        }
    }

    #[test]
    fn test_repeated_call_is_idempotent() {
        let dist = collection(&[("A", 33), ("B", 33), ("C", 34)]);
        for value in [0.0, 17.0, 50.0, 99.0, 100.0] {
            let once = redistribute(&dist, "B", value);
            let twice = redistribute(&once, "B", value);
            assert_eq!(once, twice);
        }
    }
}
