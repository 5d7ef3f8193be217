//! Variant dominance windows: the first week a variant's share of sequenced
//! cases reaches a threshold, and the first later week it falls back below.

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::schema::{derived, dominance};
use crate::table::{float_values, require_columns, string_values};

pub const DEFAULT_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct DominanceWindow {
    pub country: String,
    pub variant: String,
    pub start_week: Option<String>,
    pub end_week: Option<String>,
    pub threshold: f64,
}

/// Share of a variant among all sequenced cases; undefined for an empty week.
pub fn share(count: Option<f64>, total: Option<f64>) -> Option<f64> {
    match (count, total) {
        (Some(count), Some(total)) if total > 0.0 => Some(count / total),
        _ => None,
    }
}

/// Scan one country's weekly shares, given in ascending week order.
///
/// Weeks with an undefined share are skipped in both comparisons.
pub fn find_window(shares: &[(String, Option<f64>)], threshold: f64) -> (Option<String>, Option<String>) {
    let start = shares
        .iter()
        .find(|(_, s)| s.is_some_and(|s| s >= threshold))
        .map(|(week, _)| week.clone());

    let end = start.as_ref().and_then(|start| {
        shares
            .iter()
            .find(|(week, s)| week > start && s.is_some_and(|s| s < threshold))
            .map(|(week, _)| week.clone())
    });

    (start, end)
}

/// Dominance window for every (country, variant) pair in a weekly table.
///
/// Every pair gets a row, with empty weeks when the threshold is never reached.
pub fn dominance_windows(
    weekly: &DataFrame,
    variants: &[String],
    threshold: f64,
) -> Result<Vec<DominanceWindow>> {
    info!("Compute dominance windows (threshold {threshold})");
    require_columns(weekly, &[derived::COUNTRY, derived::WEEK, derived::TOTAL])?;

    let sorted = weekly
        .clone()
        .lazy()
        .filter(col(derived::COUNTRY).is_not_null().and(col(derived::WEEK).is_not_null()))
        .sort_by_exprs(
            [col(derived::COUNTRY), col(derived::WEEK)],
            SortMultipleOptions::default(),
        )
        .collect()?;

    let countries = string_values(&sorted, derived::COUNTRY)?;
    let weeks = string_values(&sorted, derived::WEEK)?;
    let totals = float_values(&sorted, derived::TOTAL)?;
    let counts: Vec<Vec<Option<f64>>> = variants
        .iter()
        .map(|v| float_values(&sorted, v))
        .collect::<Result<_>>()?;

    // Rows are sorted by country, so each country is one contiguous run.
    let mut runs: Vec<(String, std::ops::Range<usize>)> = Vec::new();
    for (i, country) in countries.iter().enumerate() {
        let country = country.clone().unwrap_or_default();
        match runs.last_mut() {
            Some((current, range)) if *current == country => range.end = i + 1,
            _ => runs.push((country, i..i + 1)),
        }
    }

    let mut windows = Vec::with_capacity(runs.len() * variants.len());
    for (country, range) in runs {
        for (variant, variant_counts) in variants.iter().zip(&counts) {
            let shares: Vec<(String, Option<f64>)> = range
                .clone()
                .map(|i| {
                    (
                        weeks[i].clone().unwrap_or_default(),
                        share(variant_counts[i], totals[i]),
                    )
                })
                .collect();
            let (start_week, end_week) = find_window(&shares, threshold);
            windows.push(DominanceWindow {
                country: country.clone(),
                variant: variant.clone(),
                start_week,
                end_week,
                threshold,
            });
        }
    }
    Ok(windows)
}

pub fn dominance_table(windows: &[DominanceWindow]) -> Result<DataFrame> {
    let df = DataFrame::new(vec![
        Column::new(
            dominance::COUNTRY.into(),
            windows.iter().map(|w| w.country.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            dominance::VARIANT.into(),
            windows.iter().map(|w| w.variant.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            dominance::START_WEEK.into(),
            windows.iter().map(|w| w.start_week.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            dominance::END_WEEK.into(),
            windows.iter().map(|w| w.end_week.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            dominance::THRESHOLD.into(),
            windows.iter().map(|w| w.threshold).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[(&str, Option<f64>)]) -> Vec<(String, Option<f64>)> {
        values.iter().map(|(w, s)| (w.to_string(), *s)).collect()
    }

    #[test]
    fn window_opens_and_closes() {
        let shares = series(&[
            ("202148", Some(0.2)),
            ("202149", Some(0.95)),
            ("202150", Some(0.97)),
            ("202151", Some(0.5)),
            ("202152", Some(0.3)),
        ]);
        assert_eq!(
            find_window(&shares, 0.9),
            (Some("202149".to_string()), Some("202151".to_string()))
        );
    }

    #[test]
    fn never_dominant() {
        let shares = series(&[("202148", Some(0.2)), ("202149", Some(0.89))]);
        assert_eq!(find_window(&shares, 0.9), (None, None));
    }

    #[test]
    fn dominant_until_the_end() {
        let shares = series(&[("202148", Some(0.5)), ("202149", Some(0.9)), ("202150", Some(1.0))]);
        assert_eq!(find_window(&shares, 0.9), (Some("202149".to_string()), None));
    }

    #[test]
    fn undefined_shares_are_skipped() {
        let shares = series(&[("202148", None), ("202149", Some(0.92)), ("202150", None), ("202151", Some(0.1))]);
        assert_eq!(
            find_window(&shares, 0.9),
            (Some("202149".to_string()), Some("202151".to_string()))
        );
        assert_eq!(share(Some(0.0), Some(0.0)), None);
        assert_eq!(share(Some(3.0), Some(4.0)), Some(0.75));
    }

    #[test]
    fn windows_per_country_and_variant() {
        let weekly = df!(
            derived::COUNTRY => ["BRA", "ARG", "ARG", "ARG", "BRA"],
            derived::WEEK => ["202150", "202151", "202150", "202152", "202151"],
            "Omicron" => [0u32, 10, 1, 2, 0],
            "Delta" => [5u32, 0, 9, 8, 0],
            derived::TOTAL => [5u32, 10, 10, 10, 0],
        )
        .unwrap();
        let variants = vec!["Omicron".to_string(), "Delta".to_string()];
        let windows = dominance_windows(&weekly, &variants, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(windows.len(), 4);

        assert_eq!(
            windows[0],
            DominanceWindow {
                country: "ARG".to_string(),
                variant: "Omicron".to_string(),
                start_week: Some("202151".to_string()),
                end_week: Some("202152".to_string()),
                threshold: 0.9,
            }
        );
        assert_eq!(windows[1].start_week.as_deref(), Some("202150"));
        assert_eq!(windows[1].end_week.as_deref(), Some("202151"));
        assert_eq!(windows[2].start_week, None);
        assert_eq!(windows[2].end_week, None);
        assert_eq!(windows[3].start_week.as_deref(), Some("202150"));
        assert_eq!(windows[3].end_week, None);

        let table = dominance_table(&windows).unwrap();
        assert_eq!(table.height(), 4);
        assert_eq!(table.width(), 5);
    }
}
