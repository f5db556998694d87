//! Per-feature aggregate statistics
//!
//! Stats are additive: every content mutation applies the signed
//! contribution of the item it adds or removes. Adding and then removing the
//! same item always nets to zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Aggregate stat for one feature of one diary
///
/// Fields a feature does not track stay at zero and are omitted from the
/// stored document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureStat {
    pub count: i64,
    pub file_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub words: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub letters: i64,
    /// Total sound duration in milliseconds
    #[serde(skip_serializing_if = "is_zero")]
    pub duration_ms: i64,
    /// Occurrences per value (stickers, tags); zero counts are removed
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub distribution: BTreeMap<String, i64>,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Whether a delta is being added or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Add,
    Remove,
}

impl Sign {
    fn factor(self) -> i64 {
        match self {
            Sign::Add => 1,
            Sign::Remove => -1,
        }
    }
}

/// Contribution of a single content item to its feature stat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatDelta {
    pub count: i64,
    pub file_size: i64,
    pub words: i64,
    pub letters: i64,
    pub duration_ms: i64,
    /// Value counted in the distribution map
    pub value: Option<String>,
}

impl StatDelta {
    /// A delta that counts one item of `file_size` bytes
    pub fn item(file_size: i64) -> Self {
        Self {
            count: 1,
            file_size,
            ..Self::default()
        }
    }
}

impl FeatureStat {
    /// Seconds of recorded sound
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }

    /// Apply a delta in the given direction
    pub fn apply(&mut self, delta: &StatDelta, sign: Sign) {
        let k = sign.factor();
        self.count += k * delta.count;
        self.file_size += k * delta.file_size;
        self.words += k * delta.words;
        self.letters += k * delta.letters;
        self.duration_ms += k * delta.duration_ms;

        if let Some(ref value) = delta.value {
            match sign {
                Sign::Add => increment(&mut self.distribution, value),
                Sign::Remove => decrement(&mut self.distribution, value),
            }
        }
    }

    /// Occurrences of `value` in the distribution (0 when absent)
    pub fn occurrences(&self, value: &str) -> i64 {
        self.distribution.get(value).copied().unwrap_or(0)
    }
}

/// Count one more occurrence of `value`
pub fn increment(distribution: &mut BTreeMap<String, i64>, value: &str) {
    *distribution.entry(value.to_string()).or_insert(0) += 1;
}

/// Count one fewer occurrence of `value`, removing it when it reaches zero
pub fn decrement(distribution: &mut BTreeMap<String, i64>, value: &str) {
    if let Some(n) = distribution.get_mut(value) {
        *n -= 1;
        if *n <= 0 {
            distribution.remove(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_then_remove_nets_to_zero() {
        let mut stat = FeatureStat::default();
        let delta = StatDelta {
            count: 1,
            file_size: 11,
            words: 2,
            letters: 10,
            duration_ms: 0,
            value: None,
        };
        stat.apply(&delta, Sign::Add);
        assert_eq!(stat.words, 2);
        assert_eq!(stat.file_size, 11);

        stat.apply(&delta, Sign::Remove);
        assert_eq!(stat, FeatureStat::default());
    }

    #[test]
    fn test_distribution_removes_zero_counts() {
        let mut dist = BTreeMap::new();
        increment(&mut dist, "happy");
        increment(&mut dist, "happy");
        increment(&mut dist, "sad");
        assert_eq!(dist.get("happy"), Some(&2));

        decrement(&mut dist, "sad");
        assert!(!dist.contains_key("sad"));

        decrement(&mut dist, "happy");
        decrement(&mut dist, "happy");
        assert!(dist.is_empty());

        // Decrementing an absent value is a no-op
        decrement(&mut dist, "missing");
        assert!(dist.is_empty());
    }

    #[test]
    fn test_stored_shape_omits_untracked_fields() {
        let stat = FeatureStat {
            count: 1,
            file_size: 500,
            ..FeatureStat::default()
        };
        let json = serde_json::to_value(&stat).unwrap();
        assert_eq!(json, serde_json::json!({"count": 1, "file_size": 500}));

        let parsed: FeatureStat = serde_json::from_str(r#"{"count": 3}"#).unwrap();
        assert_eq!(parsed.count, 3);
        assert_eq!(parsed.file_size, 0);
    }

    #[test]
    fn test_duration_secs() {
        let stat = FeatureStat {
            duration_ms: 1500,
            ..FeatureStat::default()
        };
        assert_eq!(stat.duration_secs(), 1.5);
    }
}
