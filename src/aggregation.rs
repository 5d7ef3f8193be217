use std::collections::{BTreeSet, HashMap};

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::normalize;
use crate::schema::{completeness, derived, metadata};
use crate::table::string_values;

/// Optional stratification of the weekly table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Grouping {
    pub by_age: bool,
    pub by_gender: bool,
}

impl Grouping {
    /// Group-by columns for this grouping, rebuilt on every call.
    pub fn key_columns(&self) -> Vec<&'static str> {
        let mut keys = vec![derived::COUNTRY, derived::WEEK];
        if self.by_age {
            keys.push(derived::AGE_GROUP);
        }
        if self.by_gender {
            keys.push(metadata::GENDER);
        }
        keys
    }

    pub fn is_stratified(&self) -> bool {
        self.by_age || self.by_gender
    }
}

/// Field completeness for one country.
#[derive(Debug, Clone, PartialEq)]
pub struct Completeness {
    pub country: String,
    pub n: usize,
    /// Percentages in `metadata::ALL` order; NaN when `n` is zero.
    pub percent: Vec<f64>,
}

#[derive(Default)]
struct CompletenessCounts {
    n: usize,
    present: [usize; metadata::ALL.len()],
}

/// Percentage of non-missing values per tracked field, for each country.
///
/// "Patient age" only counts values that parse as a finite number. Fields
/// absent from the table count as fully missing.
pub fn completeness(df: &DataFrame, countries: &[String]) -> Result<Vec<Completeness>> {
    let row_countries = string_values(df, derived::COUNTRY)?;
    let fields: Vec<Option<Vec<Option<String>>>> = metadata::ALL
        .iter()
        .map(|name| {
            if df.column(name).is_ok() {
                string_values(df, name).map(Some)
            } else {
                Ok(None)
            }
        })
        .collect::<Result<_>>()?;

    let mut counts: HashMap<&str, CompletenessCounts> = HashMap::new();
    for (i, country) in row_countries.iter().enumerate() {
        let Some(country) = country.as_deref() else {
            continue;
        };
        let entry = counts.entry(country).or_default();
        entry.n += 1;
        for (j, (name, values)) in metadata::ALL.iter().zip(&fields).enumerate() {
            let Some(values) = values else { continue };
            let value = values[i].as_deref();
            let present = if *name == metadata::PATIENT_AGE {
                normalize::is_finite_number(value)
            } else {
                value.is_some()
            };
            if present {
                entry.present[j] += 1;
            }
        }
    }

    let rows = countries
        .iter()
        .map(|country| {
            let counts = counts.remove(country.as_str()).unwrap_or_default();
            let percent = counts
                .present
                .iter()
                .map(|&present| {
                    if counts.n == 0 {
                        f64::NAN
                    } else {
                        100.0 * present as f64 / counts.n as f64
                    }
                })
                .collect();
            Completeness {
                country: country.clone(),
                n: counts.n,
                percent,
            }
        })
        .collect();
    Ok(rows)
}

/// Completeness as a table: Country, N, then one column per tracked field.
pub fn calculate_completeness(df: &DataFrame, countries: &[String]) -> Result<DataFrame> {
    info!("Calculate completeness ({} countries)", countries.len());
    let rows = completeness(df, countries)?;

    let mut columns = vec![
        Column::new(
            completeness::COUNTRY.into(),
            rows.iter().map(|r| r.country.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            completeness::N.into(),
            rows.iter().map(|r| r.n as u64).collect::<Vec<_>>(),
        ),
    ];
    for (j, name) in metadata::ALL.iter().enumerate() {
        let values: Vec<f64> = rows.iter().map(|r| r.percent[j]).collect();
        columns.push(Column::new((*name).into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

/// Sorted distinct gender values observed per country.
///
/// A table without a `Gender` column reports every country with no values.
pub fn gender_diversity(
    df: &DataFrame,
    countries: &[String],
) -> Result<Vec<(String, Vec<String>)>> {
    info!("Getting genders for each country");
    let row_countries = string_values(df, derived::COUNTRY)?;
    let genders = if df.column(metadata::GENDER).is_ok() {
        string_values(df, metadata::GENDER)?
    } else {
        vec![None; df.height()]
    };

    let mut seen: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for (country, gender) in row_countries.iter().zip(&genders) {
        if let (Some(country), Some(gender)) = (country, gender) {
            seen.entry(country.as_str()).or_default().insert(gender.as_str());
        }
    }

    Ok(countries
        .iter()
        .map(|c| {
            let values = seen
                .get(c.as_str())
                .map(|set| set.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default();
            (c.clone(), values)
        })
        .collect())
}

/// One line per country: the code followed by its gender values, tab-separated.
pub fn gender_report(diversity: &[(String, Vec<String>)]) -> String {
    diversity
        .iter()
        .map(|(country, values)| {
            std::iter::once(country.as_str())
                .chain(values.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Attach the epiweek label of each record's collection date.
pub fn calculate_epiweeks(mut df: DataFrame) -> Result<DataFrame> {
    info!("Calculate epiweeks ({} records)", df.height());
    let weeks: Vec<Option<String>> = string_values(&df, metadata::COLLECTION_DATE)?
        .iter()
        .map(|d| d.as_deref().and_then(normalize::to_epiweek))
        .collect();
    df.with_column(Column::new(derived::WEEK.into(), weeks))?;
    Ok(df)
}

/// Attach one flag column per tracked variant, `Other_variants` and `Total`.
pub fn add_variant_columns(mut df: DataFrame, variants: &[String]) -> Result<DataFrame> {
    info!("Adding variant columns ({} records)", df.height());
    let labels = string_values(&df, metadata::VARIANT)?;

    let flags: Vec<Vec<bool>> = variants
        .iter()
        .map(|v| {
            labels
                .iter()
                .map(|label| normalize::variant_flag(label.as_deref(), v))
                .collect()
        })
        .collect();
    let other: Vec<bool> = (0..df.height())
        .map(|i| !flags.iter().any(|f| f[i]))
        .collect();
    let total: Vec<u32> = (0..df.height())
        .map(|i| flags.iter().filter(|f| f[i]).count() as u32 + u32::from(other[i]))
        .collect();

    for (variant, values) in variants.iter().zip(flags) {
        df.with_column(Column::new(variant.as_str().into(), values))?;
    }
    df.with_column(Column::new(derived::OTHER_VARIANTS.into(), other))?;
    df.with_column(Column::new(derived::TOTAL.into(), total))?;
    Ok(df)
}

/// Sum variant flags per (country, week[, age group][, gender]) bucket.
///
/// Records with a null key are left out, as are empty age groups when
/// stratifying by age.
pub fn aggregate(df: DataFrame, variants: &[String], grouping: Grouping) -> Result<DataFrame> {
    info!(
        "Aggregate country data by epiweek ({} records, {:?})",
        df.height(),
        grouping
    );
    let keys: Vec<Expr> = grouping.key_columns().into_iter().map(col).collect();

    let mut present = lit(true);
    for key in grouping.key_columns() {
        present = present.and(col(key).is_not_null());
    }
    if grouping.by_age {
        present = present.and(col(derived::AGE_GROUP).neq(lit("")));
    }

    let mut sums: Vec<Expr> = variants
        .iter()
        .map(|v| count_sum(v.as_str()))
        .collect();
    sums.push(count_sum(derived::OTHER_VARIANTS));
    sums.push(count_sum(derived::TOTAL));

    let df = df
        .lazy()
        .filter(present)
        .group_by(keys.clone())
        .agg(sums)
        .sort_by_exprs(keys, SortMultipleOptions::default())
        .collect()?;
    Ok(df)
}

fn count_sum(name: &str) -> Expr {
    col(name)
        .cast(DataType::UInt32)
        .sum()
        .cast(DataType::UInt32)
        .alias(name)
}
