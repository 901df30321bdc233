//! Grouped descriptive statistics over normalized student records.
//!
//! Quartiles use linear interpolation between closest ranks: for
//! probability `p` over `n` sorted values the position is `p * (n - 1)`.
//! The median is the same computation at `p = 0.5`, so for an even count it
//! is the average of the two middle values. `std` is the sample standard
//! deviation and is `0.0` when a group holds a single value.

use std::collections::BTreeMap;

use crate::models::{DistributionStats, StudentRecord};

impl DistributionStats {
    /// Summarizes `values` in the order given. Returns `None` for an empty
    /// slice so callers never see a zeroed stub.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let std = if count > 1 {
            let squared: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (squared / (count - 1) as f64).sqrt()
        } else {
            0.0
        };

        Some(DistributionStats {
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median: quantile(&sorted, 0.5),
            std,
            q1: quantile(&sorted, 0.25),
            q3: quantile(&sorted, 0.75),
            count,
            values: values.to_vec(),
        })
    }
}

/// Interpolated quantile of an ascending, non-empty slice.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    let last = sorted.len() - 1;
    let position = p.clamp(0.0, 1.0) * last as f64;
    let lower = position.floor() as usize;
    if lower >= last {
        return sorted[last];
    }
    let fraction = position - lower as f64;
    sorted[lower] + fraction * (sorted[lower + 1] - sorted[lower])
}

/// Groups `records` by `key_fn` and summarizes the values produced by
/// `value_fn` within each group.
///
/// Records whose key is `None` are left out entirely. Records whose value is
/// `None` (or not finite) do not contribute to their group. A group that ends
/// up with no values has no entry in the result.
pub fn compute_distribution<K, KF, VF>(
    records: &[StudentRecord],
    key_fn: KF,
    value_fn: VF,
) -> BTreeMap<K, DistributionStats>
where
    K: Ord,
    KF: Fn(&StudentRecord) -> Option<K>,
    VF: Fn(&StudentRecord) -> Option<f64>,
{
    let mut groups: BTreeMap<K, Vec<f64>> = BTreeMap::new();

    for record in records {
        let Some(key) = key_fn(record) else {
            continue;
        };
        if let Some(value) = value_fn(record).filter(|v| v.is_finite()) {
            groups.entry(key).or_default().push(value);
        }
    }

    groups
        .into_iter()
        .filter_map(|(key, values)| DistributionStats::from_values(&values).map(|s| (key, s)))
        .collect()
}

/// Like [`compute_distribution`] but for a record that yields several
/// `(key, value)` pairs, e.g. one grade per subject.
pub fn compute_distribution_multi<K, F>(
    records: &[StudentRecord],
    pairs_fn: F,
) -> BTreeMap<K, DistributionStats>
where
    K: Ord,
    F: Fn(&StudentRecord) -> Vec<(K, f64)>,
{
    let mut groups: BTreeMap<K, Vec<f64>> = BTreeMap::new();

    for record in records {
        for (key, value) in pairs_fn(record) {
            if value.is_finite() {
                groups.entry(key).or_default().push(value);
            }
        }
    }

    groups
        .into_iter()
        .filter_map(|(key, values)| DistributionStats::from_values(&values).map(|s| (key, s)))
        .collect()
}

/// Summary of a single, ungrouped series.
pub fn compute_single<VF>(records: &[StudentRecord], value_fn: VF) -> Option<DistributionStats>
where
    VF: Fn(&StudentRecord) -> Option<f64>,
{
    compute_distribution(records, |_| Some(()), value_fn).remove(&())
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
