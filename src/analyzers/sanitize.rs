//! Iterative one-sigma outlier trimming ("sanitized mean").
//!
//! Each round computes the mean `m` and population standard deviation `dp`
//! of the working sample. When the coefficient of variation `|dp / m| * 100`
//! is above the threshold, values outside `[m - dp, m + dp]` are discarded
//! and the round repeats. The mean of the last sample is returned.

use crate::analyzers::utility::{finite, mean, stddev};
use crate::error::StatsError;

/// Samples smaller than this are never trimmed.
pub const MIN_TRIM_SAMPLE: usize = 3;

/// Result of a trimming run, with the subsample that produced the mean.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub mean: f64,
    pub kept: Vec<f64>,
    pub rounds: usize,
}

/// Sanitized mean of `values` with the given CV threshold (percent).
pub fn sanitized_mean(
    values: impl IntoIterator<Item = f64>,
    cv_threshold: f64,
) -> Result<f64, StatsError> {
    sanitize(values, cv_threshold).map(|s| s.mean)
}

/// Runs the trimming loop and reports the surviving subsample.
///
/// Non-finite inputs are dropped first; an empty sample is
/// [`StatsError::NoData`].
pub fn sanitize(
    values: impl IntoIterator<Item = f64>,
    cv_threshold: f64,
) -> Result<Sanitized, StatsError> {
    let mut sample = finite(values);
    let mut rounds = 0;

    loop {
        let m = mean(&sample).ok_or(StatsError::NoData)?;
        let dp = stddev(&sample, m).ok_or(StatsError::NoData)?;

        if m == 0.0 || !m.is_finite() || !dp.is_finite() || sample.len() < MIN_TRIM_SAMPLE {
            return Ok(Sanitized { mean: m, kept: sample, rounds });
        }

        let cv = (dp / m).abs() * 100.0;
        if cv <= cv_threshold {
            return Ok(Sanitized { mean: m, kept: sample, rounds });
        }

        let (lower, upper) = (m - dp, m + dp);
        let trimmed: Vec<f64> = sample
            .iter()
            .copied()
            .filter(|v| *v >= lower && *v <= upper)
            .collect();

        if trimmed.len() == sample.len() || trimmed.is_empty() {
            return Ok(Sanitized { mean: m, kept: sample, rounds });
        }

        sample = trimmed;
        rounds += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELTA: f64 = 1e-9;

    #[test]
    fn test_outlier_is_trimmed() {
        let result = sanitize([10.0, 10.0, 10.0, 100.0], 25.0).unwrap();
        assert!((result.mean - 10.0).abs() < DELTA);
        assert_eq!(result.kept, vec![10.0, 10.0, 10.0]);
        assert_eq!(result.rounds, 1);
    }

    #[test]
    fn test_low_dispersion_returns_plain_mean() {
        let values = [98.0, 100.0, 102.0, 101.0, 99.0];
        let result = sanitize(values, 25.0).unwrap();
        assert!((result.mean - 100.0).abs() < DELTA);
        assert_eq!(result.kept.len(), 5);
        assert_eq!(result.rounds, 0);
    }

    #[test]
    fn test_empty_is_no_data() {
        assert_eq!(sanitized_mean(Vec::<f64>::new(), 25.0), Err(StatsError::NoData));
        assert_eq!(
            sanitized_mean([f64::NAN, f64::INFINITY], 25.0),
            Err(StatsError::NoData)
        );
    }

    #[test]
    fn test_small_samples_are_not_trimmed() {
        assert_eq!(sanitized_mean([7.0], 25.0), Ok(7.0));
        assert_eq!(sanitized_mean([1.0, 1000.0], 25.0), Ok(500.5));
    }

    #[test]
    fn test_zero_mean_stops() {
        assert_eq!(sanitized_mean([-5.0, 0.0, 5.0], 25.0), Ok(0.0));
    }

    #[test]
    fn test_nothing_removed_stops() {
        // Two clusters: every value sits exactly on the one-sigma band.
        let result = sanitize([1.0, 1.0, 3.0, 3.0], 25.0).unwrap();
        assert!((result.mean - 2.0).abs() < DELTA);
        assert_eq!(result.rounds, 0);
    }

    #[test]
    fn test_multiple_rounds_shrink_monotonically() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 50.0, 400.0];
        let result = sanitize(values, 25.0).unwrap();
        assert!(result.rounds >= 1);
        assert!(result.rounds <= values.len());
        assert!(result.kept.len() < values.len());
        assert!(result.kept.iter().all(|v| values.contains(v)));
    }

    #[test]
    fn test_result_is_fixed_point() {
        let values = [12.0, 15.0, 11.0, 13.0, 90.0, 14.0, 2.0, 13.5];
        let first = sanitize(values, 25.0).unwrap();
        let again = sanitize(first.kept.clone(), 25.0).unwrap();
        assert!((first.mean - again.mean).abs() < DELTA);
        assert_eq!(again.rounds, 0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // mean 10, population sd 2.5 -> CV exactly 25
        let values = [7.5, 12.5];
        assert_eq!(sanitized_mean(values, 25.0), Ok(10.0));
        let values = [7.5, 7.5, 12.5, 12.5];
        let result = sanitize(values, 25.0).unwrap();
        assert_eq!(result.rounds, 0);
        assert!((result.mean - 10.0).abs() < DELTA);
    }
}
