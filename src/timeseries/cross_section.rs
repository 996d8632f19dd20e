//! Cross-sectional aggregates over already shifted target values
//!
//! These run after every entity's `shift(H)` series is known. They only ever
//! aggregate shifted values, and a row at week t only sees rows at weeks <= t,
//! so no aggregate reads a target newer than t - H.

use chrono::NaiveDate;
use std::collections::HashMap;

/// Expanding mean of `shifted` within (group key, ISO week of year)
///
/// For each row, averages the present shifted values of every row sharing its
/// group key and week of year whose week is not later than its own. Rows with
/// a null key, or with no present value to average, get `None`.
pub fn seasonal_average(
    group_keys: &[Option<String>],
    week_of_year: &[u32],
    weeks: &[NaiveDate],
    shifted: &[Option<f64>],
) -> Vec<Option<f64>> {
    let n = shifted.len();
    let mut buckets: HashMap<(&str, u32), Vec<usize>> = HashMap::new();
    for row in 0..n {
        if let Some(key) = group_keys[row].as_deref() {
            buckets.entry((key, week_of_year[row])).or_default().push(row);
        }
    }

    let mut result = vec![None; n];
    for rows in buckets.values_mut() {
        // Stable: rows of the same week keep panel order, so sums are reproducible
        rows.sort_by_key(|&row| weeks[row]);

        let (mut sum, mut count) = (0.0_f64, 0usize);
        let mut start = 0;
        while start < rows.len() {
            let week = weeks[rows[start]];
            let end = start + rows[start..].iter().take_while(|&&row| weeks[row] == week).count();

            for &row in &rows[start..end] {
                if let Some(value) = shifted[row] {
                    sum += value;
                    count += 1;
                }
            }
            let mean = (count > 0).then(|| sum / count as f64);
            for &row in &rows[start..end] {
                result[row] = mean;
            }
            start = end;
        }
    }
    result
}

/// Sum of present `shifted` values per (group key, week)
///
/// Rows with a null key get `None`; a week where no peer has a shifted value
/// sums to zero.
pub fn group_week_total(
    group_keys: &[Option<String>],
    weeks: &[NaiveDate],
    shifted: &[Option<f64>],
) -> Vec<Option<f64>> {
    let mut totals: HashMap<(&str, NaiveDate), f64> = HashMap::new();
    for (row, key) in group_keys.iter().enumerate() {
        if let Some(key) = key.as_deref() {
            let total = totals.entry((key, weeks[row])).or_insert(0.0);
            if let Some(value) = shifted[row] {
                *total += value;
            }
        }
    }

    group_keys
        .iter()
        .enumerate()
        .map(|(row, key)| {
            let key = key.as_deref()?;
            totals.get(&(key, weeks[row])).copied()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Duration::weeks(offset)
    }

    fn keys(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_seasonal_average_is_expanding() {
        // One store, same week of year across three years
        let group = keys(&["s1", "s1", "s1"]);
        let woy = vec![1, 1, 1];
        let weeks = vec![week(0), week(52), week(104)];
        let shifted = vec![None, Some(10.0), Some(20.0)];

        let avg = seasonal_average(&group, &woy, &weeks, &shifted);
        assert_eq!(avg, vec![None, Some(10.0), Some(15.0)]);
    }

    #[test]
    fn test_seasonal_average_pools_same_week_peers() {
        let group = keys(&["s1", "s1", "s2"]);
        let woy = vec![5, 5, 5];
        let weeks = vec![week(4), week(4), week(4)];
        let shifted = vec![Some(2.0), Some(4.0), Some(100.0)];

        let avg = seasonal_average(&group, &woy, &weeks, &shifted);
        assert_eq!(avg, vec![Some(3.0), Some(3.0), Some(100.0)]);
    }

    #[test]
    fn test_seasonal_average_ignores_later_rows() {
        let group = keys(&["s1", "s1"]);
        let woy = vec![1, 1];
        // Panel order puts the later row first
        let weeks = vec![week(52), week(0)];
        let shifted = vec![Some(50.0), Some(1.0)];

        let avg = seasonal_average(&group, &woy, &weeks, &shifted);
        assert_eq!(avg, vec![Some(25.5), Some(1.0)]);
    }

    #[test]
    fn test_null_group_key() {
        let group = vec![None, Some("s1".to_string())];
        let weeks = vec![week(0), week(0)];
        let shifted = vec![Some(1.0), Some(2.0)];

        assert_eq!(seasonal_average(&group, &[1, 1], &weeks, &shifted), vec![None, Some(2.0)]);
        assert_eq!(group_week_total(&group, &weeks, &shifted), vec![None, Some(2.0)]);
    }

    #[test]
    fn test_group_week_total() {
        let group = keys(&["s1", "s1", "s1", "s2"]);
        let weeks = vec![week(3), week(3), week(4), week(3)];
        let shifted = vec![Some(10.0), Some(30.0), None, Some(7.0)];

        let totals = group_week_total(&group, &weeks, &shifted);
        assert_eq!(totals, vec![Some(40.0), Some(40.0), Some(0.0), Some(7.0)]);
    }
}
