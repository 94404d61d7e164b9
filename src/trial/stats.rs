//! Small order statistics used by stratification and the datasets.

use super::error::TrialError;

/// Linear-interpolation quantile of an ascending slice (`0.0 <= q <= 1.0`).
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Median and interquartile range.
pub fn median_iqr(values: &[f64]) -> Option<(f64, f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some((
        quantile(&sorted, 0.5)?,
        quantile(&sorted, 0.25)?,
        quantile(&sorted, 0.75)?,
    ))
}

/// Equal-frequency quartile labels (0..=3), one per input value.
///
/// Bin edges are the 0/25/50/75/100th percentiles; the first bin is closed
/// on the left, the rest are (lo, hi]. Repeated edges mean the data cannot
/// be split into four bins and are reported rather than merged.
pub fn quartile_labels(values: &[i64], column: &'static str) -> Result<Vec<u8>, TrialError> {
    if values.len() < 4 {
        return Err(TrialError::degenerate(
            column,
            format!("need at least 4 papers for quartiles, got {}", values.len()),
        ));
    }
    let mut sorted: Vec<f64> = values.iter().map(|v| *v as f64).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let edges: Vec<f64> = [0.0, 0.25, 0.5, 0.75, 1.0]
        .iter()
        .filter_map(|q| quantile(&sorted, *q))
        .collect();
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TrialError::degenerate(
            column,
            format!("quartile bin edges must be unique, got {edges:?}"),
        ));
    }

    Ok(values
        .iter()
        .map(|v| {
            let v = *v as f64;
            edges[1..]
                .iter()
                .position(|edge| v <= *edge)
                .unwrap_or(3) as u8
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&data, 0.0), Some(1.0));
        assert_eq!(quantile(&data, 1.0), Some(4.0));
        assert_eq!(quantile(&data, 0.5), Some(2.5));
        assert!((quantile(&data, 0.1).unwrap() - 1.3).abs() < 1e-9);
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&data, 1.5), None);
    }

    #[test]
    fn median_iqr_of_small_sample() {
        let (median, q1, q3) = median_iqr(&[5.0, 1.0, 3.0]).unwrap();
        assert_eq!(median, 3.0);
        assert_eq!(q1, 2.0);
        assert_eq!(q3, 4.0);
        assert!(median_iqr(&[]).is_none());
    }

    #[test]
    fn quartiles_split_evenly() {
        let values: Vec<i64> = (1..=8).collect();
        let labels = quartile_labels(&values, "years").unwrap();
        assert_eq!(labels, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn quartiles_keep_input_order() {
        let labels = quartile_labels(&[8, 1, 5, 3], "years").unwrap();
        assert_eq!(labels, vec![3, 0, 2, 1]);
    }

    #[test]
    fn quartiles_reject_repeated_edges() {
        let err = quartile_labels(&[2, 2, 2, 2, 3], "years_since_publication").unwrap_err();
        assert!(matches!(err, TrialError::Degenerate { stage: "years_since_publication", .. }));
    }

    #[test]
    fn quartiles_reject_tiny_samples() {
        assert!(quartile_labels(&[1, 2, 3], "years").is_err());
    }
}
