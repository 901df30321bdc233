use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::HistogramData;

/// Buckets `values` into `bin_count` equal-width bins between `range_min`
/// and `range_max` (defaulting to the data's own extremes).
///
/// Bins are half-open `[lo, hi)` except the last, which also holds values
/// equal to `range_max`. Values outside the range are not counted.
pub fn compute_histogram(
    values: &[f64],
    bin_count: usize,
    range_min: Option<f64>,
    range_max: Option<f64>,
) -> AnalyticsResult<HistogramData> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Err(AnalyticsError::EmptyInput {
            what: "values".to_string(),
        });
    }
    if bin_count == 0 {
        return Err(AnalyticsError::InvalidBinCount);
    }

    let min = range_min.unwrap_or_else(|| finite.iter().copied().fold(f64::INFINITY, f64::min));
    let max = range_max.unwrap_or_else(|| finite.iter().copied().fold(f64::NEG_INFINITY, f64::max));
    if !min.is_finite() || !max.is_finite() || min >= max || !(max - min).is_finite() {
        return Err(AnalyticsError::InvalidRange { min, max });
    }

    let bin_edges = edges(min, max, bin_count);
    let mut counts = vec![0usize; bin_count];
    for &value in &finite {
        if let Some(idx) = bin_index(&bin_edges, value) {
            counts[idx] += 1;
        }
    }

    let labels = bin_edges
        .windows(2)
        .map(|pair| format!("{}-{}", one_decimal(pair[0]), one_decimal(pair[1])))
        .collect();

    Ok(HistogramData {
        counts,
        bin_edges,
        labels,
    })
}

fn edges(min: f64, max: f64, bin_count: usize) -> Vec<f64> {
    let width = (max - min) / bin_count as f64;
    let mut edges: Vec<f64> = (0..bin_count).map(|i| min + width * i as f64).collect();
    edges.push(max);
    edges
}

/// One-decimal rendering that rounds exact ties away from zero, so 1.25
/// prints as "1.3". `{:.1}` alone would round it to even.
fn one_decimal(x: f64) -> String {
    // Only x.25 and x.75 are exact ties in binary: x * 4 is then an odd integer.
    let quarters = x.abs() * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 == 1.0 {
        let rounded = (x.abs() * 10.0).ceil() / 10.0;
        return format!("{:.1}", rounded.copysign(x));
    }
    format!("{x:.1}")
}

fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    let bins = edges.len() - 1;
    let (min, max) = (edges[0], edges[bins]);
    if value < min || value > max {
        return None;
    }
    if value == max {
        return Some(bins - 1);
    }

    // The arithmetic estimate can land one bin off near an edge; the edge
    // table is authoritative.
    let mut idx = (((value - min) / (max - min)) * bins as f64).floor() as usize;
    idx = idx.min(bins - 1);
    while idx > 0 && value < edges[idx] {
        idx -= 1;
    }
    while idx + 1 < bins && value >= edges[idx + 1] {
        idx += 1;
    }
    Some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_value_lands_in_last_bin() {
        let hist = compute_histogram(&[0.0, 25.0, 50.0, 75.0, 100.0], 4, Some(0.0), Some(100.0))
            .unwrap();
        assert_eq!(hist.counts, vec![1, 1, 1, 2]);
        assert_eq!(hist.bin_edges, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_eq!(
            hist.labels,
            vec!["0.0-25.0", "25.0-50.0", "50.0-75.0", "75.0-100.0"]
        );
    }

    #[test]
    fn range_defaults_to_data_extremes() {
        let values = [2.0, 4.0, 6.0, 8.0, 10.0];
        let hist = compute_histogram(&values, 2, None, None).unwrap();
        assert_eq!(hist.bin_edges, vec![2.0, 6.0, 10.0]);
        assert_eq!(hist.counts, vec![2, 3]);
        assert_eq!(hist.counts.iter().sum::<usize>(), values.len());
    }

    #[test]
    fn values_outside_range_are_not_counted() {
        let values = [-1.0, 0.0, 5.0, 9.99, 10.0, 10.5];
        let hist = compute_histogram(&values, 10, Some(0.0), Some(10.0)).unwrap();
        let in_range = values.iter().filter(|v| (0.0..=10.0).contains(*v)).count();
        assert_eq!(hist.counts.iter().sum::<usize>(), in_range);
        assert_eq!(hist.counts[0], 1);
        assert_eq!(hist.counts[5], 1);
        assert_eq!(hist.counts[9], 2);
    }

    #[test]
    fn edges_are_strictly_increasing() {
        let hist = compute_histogram(&[0.1, 0.7], 3, Some(0.0), Some(1.0)).unwrap();
        assert_eq!(hist.bin_edges.len(), hist.counts.len() + 1);
        assert!(hist.bin_edges.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(hist.labels, vec!["0.0-0.3", "0.3-0.7", "0.7-1.0"]);
        assert_eq!(hist.counts, vec![1, 0, 1]);
    }

    #[test]
    fn labels_round_ties_up() {
        let hist = compute_histogram(&[0.0, 10.0], 8, Some(0.0), Some(10.0)).unwrap();
        assert_eq!(
            hist.labels,
            vec![
                "0.0-1.3", "1.3-2.5", "2.5-3.8", "3.8-5.0", "5.0-6.3", "6.3-7.5", "7.5-8.8",
                "8.8-10.0"
            ]
        );
        assert_eq!(one_decimal(-1.25), "-1.3");
        assert_eq!(one_decimal(0.35), "0.3");
        assert_eq!(one_decimal(0.05), "0.1");
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(
            compute_histogram(&[], 10, Some(0.0), Some(10.0)).unwrap_err(),
            AnalyticsError::EmptyInput {
                what: "values".to_string()
            }
        );
    }

    #[test]
    fn degenerate_ranges_are_rejected() {
        assert_eq!(
            compute_histogram(&[1.0], 4, Some(5.0), Some(5.0)).unwrap_err(),
            AnalyticsError::InvalidRange { min: 5.0, max: 5.0 }
        );
        assert!(matches!(
            compute_histogram(&[3.0, 3.0], 4, None, None).unwrap_err(),
            AnalyticsError::InvalidRange { .. }
        ));
        assert_eq!(
            compute_histogram(&[0.0], 4, Some(-1e308), Some(1e308)).unwrap_err(),
            AnalyticsError::InvalidRange {
                min: -1e308,
                max: 1e308
            }
        );
        assert_eq!(
            compute_histogram(&[1.0], 0, None, Some(2.0)).unwrap_err(),
            AnalyticsError::InvalidBinCount
        );
    }
}
