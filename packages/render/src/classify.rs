//! Natural-breaks (Jenks) classification.

/// Computes `k` optimal class breaks for `values` using Jenks' natural
/// breaks (Fisher's exact dynamic program).
///
/// Returns the upper bound of each class in ascending order; the last
/// break is the maximum. Non-finite values are ignored. When there are no
/// more distinct values than `k`, every distinct value becomes its own
/// class.
#[must_use]
pub fn natural_breaks(values: &[f64], k: usize) -> Vec<f64> {
    let mut data: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if k == 0 || data.is_empty() {
        return Vec::new();
    }
    data.sort_by(f64::total_cmp);

    let mut distinct = data.clone();
    distinct.dedup();
    if distinct.len() <= k {
        return distinct;
    }

    let n = data.len();
    // 1-based: lower[l][j] is the first element of class j when the first
    // l elements are split into j classes; var[l][j] is that split's cost.
    let mut lower = vec![vec![0usize; k + 1]; n + 1];
    let mut var = vec![vec![f64::INFINITY; k + 1]; n + 1];
    for j in 1..=k {
        lower[1][j] = 1;
        var[1][j] = 0.0;
    }

    for l in 2..=n {
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut w = 0.0;
        let mut variance = 0.0;

        for m in 1..=l {
            let lower_idx = l - m + 1;
            let value = data[lower_idx - 1];
            w += 1.0;
            sum += value;
            sum_sq += value * value;
            variance = sum.mul_add(-sum / w, sum_sq);

            let prev = lower_idx - 1;
            if prev != 0 {
                for j in 2..=k {
                    let candidate = variance + var[prev][j - 1];
                    if var[l][j] >= candidate {
                        lower[l][j] = lower_idx;
                        var[l][j] = candidate;
                    }
                }
            }
        }

        lower[l][1] = 1;
        var[l][1] = variance;
    }

    let mut breaks = vec![0.0; k];
    breaks[k - 1] = data[n - 1];
    let mut count = n;
    for j in (2..=k).rev() {
        let first = lower[count][j].max(2);
        breaks[j - 2] = data[first - 2];
        count = first - 1;
    }

    breaks.dedup();
    breaks
}

/// Index of the class `value` falls in: the first break not below it.
/// Values above the last break land in the last class.
#[must_use]
pub fn class_index(value: f64, breaks: &[f64]) -> Option<usize> {
    if !value.is_finite() || breaks.is_empty() {
        return None;
    }
    Some(
        breaks
            .iter()
            .position(|upper| value <= *upper)
            .unwrap_or(breaks.len() - 1),
    )
}

/// Human-readable range labels for each class, e.g. `"12.5 - 30.1"`.
#[must_use]
pub fn break_labels(values: &[f64], breaks: &[f64]) -> Vec<String> {
    let min = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .reduce(f64::min);

    let mut lower = min;
    breaks
        .iter()
        .map(|upper| {
            let label = lower.map_or_else(
                || format!("{upper:.2}"),
                |l| format!("{l:.2} - {upper:.2}"),
            );
            lower = Some(*upper);
            label
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_clusters() {
        let values = [1.0, 2.0, 3.0, 50.0, 51.0, 52.0, 100.0, 101.0];
        assert_eq!(natural_breaks(&values, 3), vec![3.0, 52.0, 101.0]);
    }

    #[test]
    fn ignores_nan_and_order() {
        let values = [101.0, f64::NAN, 2.0, 52.0, 1.0, 100.0, 50.0, 3.0, 51.0];
        assert_eq!(natural_breaks(&values, 3), vec![3.0, 52.0, 101.0]);
    }

    #[test]
    fn few_distinct_values_get_one_class_each() {
        assert_eq!(natural_breaks(&[5.0, 7.0, 5.0], 5), vec![5.0, 7.0]);
        assert!(natural_breaks(&[], 5).is_empty());
        assert!(natural_breaks(&[1.0], 0).is_empty());
    }

    #[test]
    fn last_break_is_maximum() {
        let values: Vec<f64> = (0..40).map(|i| f64::from(i * i)).collect();
        let breaks = natural_breaks(&values, 5);
        assert_eq!(breaks.len(), 5);
        assert_eq!(breaks.last().copied(), Some(1521.0));
        assert!(breaks.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn classifies_against_breaks() {
        let breaks = [3.0, 52.0, 101.0];
        assert_eq!(class_index(1.0, &breaks), Some(0));
        assert_eq!(class_index(3.0, &breaks), Some(0));
        assert_eq!(class_index(3.5, &breaks), Some(1));
        assert_eq!(class_index(500.0, &breaks), Some(2));
        assert_eq!(class_index(f64::NAN, &breaks), None);
        assert_eq!(class_index(1.0, &[]), None);
    }

    #[test]
    fn labels_span_each_class() {
        let labels = break_labels(&[1.0, 2.0, 9.0], &[2.0, 9.0]);
        assert_eq!(labels, vec!["1.00 - 2.00", "2.00 - 9.00"]);
    }
}
