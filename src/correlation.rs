//! Correlation of per-country subset tables against the country's index table.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::{Result, SurveillanceError};
use crate::schema::{correlation, derived};
use crate::table::{float_values, read_table_as_strings, string_values};

/// Correlations of one subset file, keyed by variant, "Total" and "ratio".
pub type SubsetCorrelations = BTreeMap<String, Option<f64>>;

/// Pearson correlation; `None` for fewer than two pairs or zero variance.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len();
    if n < 2 {
        return None;
    }
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

fn keyed_rows(df: &DataFrame) -> Result<Vec<(String, String)>> {
    let countries = string_values(df, derived::COUNTRY)?;
    let weeks = string_values(df, derived::WEEK)?;
    Ok(countries
        .into_iter()
        .zip(weeks)
        .map(|(c, w)| (c.unwrap_or_default(), w.unwrap_or_default()))
        .collect())
}

/// Join two weekly tables on (Country, Week) and correlate each variant and Total.
pub fn correlations(
    index: &DataFrame,
    other: &DataFrame,
    variants: &[String],
) -> Result<SubsetCorrelations> {
    let index_keys = keyed_rows(index)?;
    let other_keys = keyed_rows(other)?;
    let position: HashMap<&(String, String), usize> =
        index_keys.iter().enumerate().map(|(i, k)| (k, i)).collect();

    let mut result = BTreeMap::new();
    for name in variants.iter().map(String::as_str).chain([derived::TOTAL]) {
        let x = float_values(index, name)?;
        let y = float_values(other, name)?;
        let pairs: Vec<(f64, f64)> = other_keys
            .iter()
            .enumerate()
            .filter_map(|(j, key)| {
                let i = *position.get(key)?;
                Some((x[i]?, y[j]?))
            })
            .collect();
        result.insert(name.to_string(), pearson(&pairs));
    }
    Ok(result)
}

fn total_sum(df: &DataFrame) -> Result<f64> {
    Ok(float_values(df, derived::TOTAL)?.into_iter().flatten().sum())
}

/// Correlate every `<C>_weekly*.csv` subset (except stratified `group` files)
/// in `<root>/<C>/` against `<C>_weekly.csv`.
pub fn subset_correlations(
    root: &Path,
    country: &str,
    variants: &[String],
) -> Result<BTreeMap<String, SubsetCorrelations>> {
    let dir = root.join(country);
    let index_name = format!("{country}_weekly.csv");
    let index_path = dir.join(&index_name);
    if !index_path.exists() {
        return Err(SurveillanceError::InvalidData(format!(
            "Generate index file {}",
            index_path.display()
        )));
    }

    let index = read_table_as_strings(&index_path)?;
    let total = total_sum(&index)?;
    let prefix = format!("{country}_weekly");

    let mut names: Vec<String> = fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| {
            name.starts_with(&prefix)
                && name.ends_with(".csv")
                && *name != index_name
                && !name.contains("group")
        })
        .collect();
    names.sort();

    let mut result = BTreeMap::new();
    for name in names {
        let subset = read_table_as_strings(&dir.join(&name))?;
        let mut corr = correlations(&index, &subset, variants)?;
        let ratio = if total == 0.0 {
            None
        } else {
            Some(total_sum(&subset)? / total)
        };
        corr.insert(correlation::RATIO.to_string(), ratio);
        result.insert(name, corr);
    }
    Ok(result)
}

/// Correlations for every country with an index file; others are skipped.
pub fn correlation_report(
    root: &Path,
    countries: &[String],
    variants: &[String],
) -> Result<BTreeMap<String, BTreeMap<String, SubsetCorrelations>>> {
    let mut report = BTreeMap::new();
    for country in countries {
        match subset_correlations(root, country, variants) {
            Ok(subsets) => {
                info!("Correlated {} subsets for {country}", subsets.len());
                report.insert(country.clone(), subsets);
            }
            Err(SurveillanceError::InvalidData(msg)) => {
                warn!("Skipping {country}: {msg}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

/// Write the report as pretty JSON with sorted keys.
pub fn write_report(
    report: &BTreeMap<String, BTreeMap<String, SubsetCorrelations>>,
    path: &Path,
) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::write_csv;

    #[test]
    fn pearson_of_linear_series() {
        let pairs = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        let r = pearson(&pairs).unwrap();
        assert!((r - 1.0).abs() < 1e-12);

        let pairs = [(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)];
        assert!((pearson(&pairs).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_is_undefined_for_degenerate_input() {
        assert_eq!(pearson(&[(1.0, 1.0)]), None);
        assert_eq!(pearson(&[(1.0, 1.0), (1.0, 2.0)]), None);
    }

    fn weekly(totals: [u32; 3]) -> DataFrame {
        df!(
            derived::COUNTRY => ["ARG", "ARG", "ARG"],
            derived::WEEK => ["202150", "202151", "202152"],
            "Omicron" => [totals[0], totals[1] / 2, totals[2]],
            derived::TOTAL => totals,
        )
        .unwrap()
    }

    #[test]
    fn subset_correlations_against_index() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("ARG");
        fs::create_dir_all(&dir).unwrap();
        write_csv(&mut weekly([10, 20, 30]), &dir.join("ARG_weekly.csv")).unwrap();
        write_csv(&mut weekly([1, 2, 3]), &dir.join("ARG_weekly_age.csv")).unwrap();
        write_csv(&mut weekly([5, 1, 5]), &dir.join("ARG_weekly_age_group.csv")).unwrap();

        let variants = vec!["Omicron".to_string()];
        let result = subset_correlations(tmp.path(), "ARG", &variants).unwrap();
        assert_eq!(result.len(), 1);
        let age = &result["ARG_weekly_age.csv"];
        assert!((age["Total"].unwrap() - 1.0).abs() < 1e-12);
        assert!((age["ratio"].unwrap() - 0.1).abs() < 1e-12);

        let report =
            correlation_report(tmp.path(), &["ARG".to_string(), "BRA".to_string()], &variants)
                .unwrap();
        assert!(report.contains_key("ARG"));
        assert!(!report.contains_key("BRA"));
    }
}
