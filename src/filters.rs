//! Record filter chain. Each stage consumes the full record table and returns
//! a possibly smaller, possibly column-augmented table. Order is significant.

use polars::prelude::*;
use tracing::{error, info};

use crate::error::{Result, SurveillanceError};
use crate::normalize;
use crate::reference::{CountryReferenceMap, GenderVocabulary};
use crate::schema::{derived, metadata};
use crate::table::{filter_rows, float_values, require_columns, string_values};

/// Offending accession ids reported in a temporal violation.
const MAX_REPORTED_VIOLATIONS: usize = 10;

/// Keep only records whose host is exactly "Human".
pub fn filter_human_hosts(df: DataFrame) -> Result<DataFrame> {
    info!("Filter for human hosts ({} records)", df.height());
    require_columns(&df, &[metadata::HOST])?;
    let df = df
        .lazy()
        .filter(col(metadata::HOST).eq(lit(metadata::HUMAN_HOST)))
        .collect()?;
    Ok(df)
}

/// Attach `Country` and `Region` parsed from `Location`. Never drops rows.
pub fn parse_locations(mut df: DataFrame, countries: &CountryReferenceMap) -> Result<DataFrame> {
    info!("Parse location into country and region ({} records)", df.height());
    let locations = string_values(&df, metadata::LOCATION)?;

    let (country, region): (Vec<Option<String>>, Vec<Option<String>>) = locations
        .iter()
        .map(|loc| match loc {
            Some(raw) => normalize::parse_location(raw, countries),
            None => (None, None),
        })
        .unzip();

    df.with_column(Column::new(derived::COUNTRY.into(), country))?;
    df.with_column(Column::new(derived::REGION.into(), region))?;
    Ok(df)
}

/// Restrict records to the countries and regions under observation.
///
/// Without a country, any mapped country is kept. Regions require a country.
pub fn filter_location(
    df: DataFrame,
    countries: &CountryReferenceMap,
    country: Option<&str>,
    regions: Option<&[String]>,
) -> Result<DataFrame> {
    info!(
        "Filter for countries and regions under observation ({} records, country={:?}, regions={:?})",
        df.height(),
        country,
        regions
    );
    if regions.is_some() && country.is_none() {
        return Err(SurveillanceError::Usage(
            "If you specify region, country ISO3 code has to be specified as well".into(),
        ));
    }

    let row_countries = string_values(&df, derived::COUNTRY)?;
    let keep: Vec<bool> = match (country, regions) {
        (None, _) => row_countries
            .iter()
            .map(|c| c.as_deref().is_some_and(|c| countries.contains_code(c)))
            .collect(),
        (Some(target), None) => row_countries
            .iter()
            .map(|c| c.as_deref() == Some(target))
            .collect(),
        (Some(target), Some(allowed)) => {
            let row_regions = string_values(&df, derived::REGION)?;
            row_countries
                .iter()
                .zip(&row_regions)
                .map(|(c, r)| {
                    c.as_deref() == Some(target)
                        && r.as_deref().is_some_and(|r| allowed.iter().any(|a| a == r))
                })
                .collect()
        }
    };

    filter_rows(&df, &keep)
}

/// Attach reconciled age bounds and overwrite `Gender` with the reconciled token.
pub fn reconcile_age_gender(mut df: DataFrame, genders: &GenderVocabulary) -> Result<DataFrame> {
    info!("Reconcile patient age and gender ({} records)", df.height());
    let ages = string_values(&df, metadata::PATIENT_AGE)?;
    let raw_genders = string_values(&df, metadata::GENDER)?;

    let mut lower = Vec::with_capacity(df.height());
    let mut upper = Vec::with_capacity(df.height());
    let mut gender = Vec::with_capacity(df.height());
    for (age, g) in ages.iter().zip(&raw_genders) {
        let fixed = normalize::reconcile_age_gender(age.as_deref(), g.as_deref(), genders);
        lower.push(fixed.age_lower);
        upper.push(fixed.age_upper);
        gender.push(fixed.gender);
    }

    df.with_column(Column::new(derived::AGE_LOWER.into(), lower))?;
    df.with_column(Column::new(derived::AGE_UPPER.into(), upper))?;
    df.with_column(Column::new(metadata::GENDER.into(), gender))?;
    Ok(df)
}

fn require_single_country(country: Option<&str>, stage: &str) -> Result<()> {
    if country.is_none() {
        return Err(SurveillanceError::Usage(format!(
            "{stage} requires a single country target"
        )));
    }
    Ok(())
}

/// Drop records whose reconciled age bounds are not both finite.
pub fn filter_valid_age(df: DataFrame, country: Option<&str>) -> Result<DataFrame> {
    require_single_country(country, "Age filtering")?;
    info!("Filter for records with a valid age ({} records)", df.height());
    require_columns(&df, &[derived::AGE_LOWER, derived::AGE_UPPER])?;

    let lower = float_values(&df, derived::AGE_LOWER)?;
    let upper = float_values(&df, derived::AGE_UPPER)?;
    let keep: Vec<bool> = lower
        .iter()
        .zip(&upper)
        .map(|(l, u)| l.is_some_and(f64::is_finite) && u.is_some_and(f64::is_finite))
        .collect();
    filter_rows(&df, &keep)
}

/// Attach the `Age group` label derived from the reconciled age bounds.
pub fn add_age_groups(mut df: DataFrame, country: Option<&str>) -> Result<DataFrame> {
    require_single_country(country, "Age grouping")?;
    info!("Assign age groups ({} records)", df.height());
    let lower = float_values(&df, derived::AGE_LOWER)?;
    let upper = float_values(&df, derived::AGE_UPPER)?;
    let groups: Vec<String> = lower
        .iter()
        .zip(&upper)
        .map(|(l, u)| normalize::age_to_bucket(*l, *u))
        .collect();
    df.with_column(Column::new(derived::AGE_GROUP.into(), groups))?;
    Ok(df)
}

/// Replace `Gender` with the canonical label of each record's country and drop
/// records whose gender token is not in that vocabulary.
pub fn map_genders(
    mut df: DataFrame,
    genders: &GenderVocabulary,
    country: Option<&str>,
) -> Result<DataFrame> {
    require_single_country(country, "Gender mapping")?;
    info!("Map genders to canonical labels ({} records)", df.height());
    let row_countries = string_values(&df, derived::COUNTRY)?;
    let raw = string_values(&df, metadata::GENDER)?;

    let mapped: Vec<Option<String>> = row_countries
        .iter()
        .zip(&raw)
        .map(|(c, g)| match (c, g) {
            (Some(c), Some(g)) => genders.canonical(c, g),
            _ => None,
        })
        .collect();
    let keep: Vec<bool> = mapped.iter().map(Option::is_some).collect();

    df.with_column(Column::new(metadata::GENDER.into(), mapped))?;
    filter_rows(&df, &keep)
}

/// Fail when any record was collected after it was submitted.
///
/// Dates compare as ISO strings; records missing either date are not checked.
pub fn check_collection_before_submission(df: DataFrame) -> Result<DataFrame> {
    info!("Check that collection date is before submission ({} records)", df.height());
    let collected = string_values(&df, metadata::COLLECTION_DATE)?;
    let submitted = string_values(&df, metadata::SUBMISSION_DATE)?;
    let accessions = if df.column(metadata::ACCESSION_ID).is_ok() {
        string_values(&df, metadata::ACCESSION_ID)?
    } else {
        vec![None; df.height()]
    };

    let mut offending = Vec::new();
    for (i, (c, s)) in collected.iter().zip(&submitted).enumerate() {
        if let (Some(c), Some(s)) = (c, s) {
            if c > s {
                let accession = accessions[i].clone().unwrap_or_else(|| format!("row {i}"));
                error!(
                    "Collection date {} after submission date {} for {}",
                    c, s, accession
                );
                offending.push(accession);
            }
        }
    }

    if !offending.is_empty() {
        let count = offending.len();
        offending.truncate(MAX_REPORTED_VIOLATIONS);
        return Err(SurveillanceError::TemporalViolation {
            count,
            accessions: offending,
        });
    }
    Ok(df)
}
