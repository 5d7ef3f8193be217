//! Synthetic metadata records for exercising the pipeline end to end.

use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, SurveillanceError};
use crate::schema::metadata;

pub const DEFAULT_COUNT: usize = 100;
pub const DEFAULT_SEED: u64 = 10;

const FIRST_ACCESSION: u64 = 200_000;

fn first_collection_date() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2021, 6, 1)
}

fn weighted<'a, T>(items: &'a [T], weights: &[f64]) -> Result<(&'a [T], WeightedIndex<f64>)> {
    let index = WeightedIndex::new(weights)
        .map_err(|e| SurveillanceError::General(format!("invalid weights: {e}")))?;
    Ok((items, index))
}

/// Generate `count` metadata rows, all columns as strings.
///
/// Collection dates fall in [2021-06-01, today); submission date is `today`.
pub fn generate(count: usize, seed: u64, today: NaiveDate) -> Result<DataFrame> {
    let start = first_collection_date()
        .ok_or_else(|| SurveillanceError::General("invalid start date".into()))?;
    let days = (today - start).num_days();
    if days <= 0 {
        return Err(SurveillanceError::InvalidData(format!(
            "today ({today}) must be after {start}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let (hosts, host_index) = weighted(&["Human", "Mouse"], &[90.0, 10.0])?;
    let (genders, gender_index) = weighted(&["Male", "Female", "Other"], &[0.3, 0.3, 0.2])?;
    let (variants, variant_index) = weighted(&["VOC Omicron", "VOC Delta"], &[0.4, 0.6])?;

    let mut columns: Vec<Vec<String>> = vec![Vec::with_capacity(count); metadata::ALL.len()];
    for i in 0..count {
        let collected = start + Duration::days(rng.gen_range(0..days));
        let row = [
            format!("hCoV-19/Argentina/FAKE-{}/2021", rng.gen_range(200_000..300_000)),
            "betacoronavirus".to_string(),
            format!("EPI_FAKE_{}", FIRST_ACCESSION + i as u64),
            collected.to_string(),
            "South America / Argentina / Buenos Aires".to_string(),
            String::new(),
            rng.gen_range(29_000..30_000).to_string(),
            hosts[host_index.sample(&mut rng)].to_string(),
            rng.gen_range(0..100).to_string(),
            genders[gender_index.sample(&mut rng)].to_string(),
            "QQ".to_string(),
            "ZZ.9".to_string(),
            "2021-12-06".to_string(),
            variants[variant_index.sample(&mut rng)].to_string(),
            "AA".to_string(),
            today.to_string(),
            String::new(),
            "True".to_string(),
            python_bool(rng.gen::<f64>() > 0.75),
            python_bool(rng.gen::<f64>() > 0.2),
            "10".to_string(),
            "55".to_string(),
        ];
        for (column, value) in columns.iter_mut().zip(row) {
            column.push(value);
        }
    }

    let columns: Vec<Column> = metadata::ALL
        .iter()
        .zip(columns)
        .map(|(name, values)| Column::new((*name).into(), values))
        .collect();
    Ok(DataFrame::new(columns)?)
}

fn python_bool(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::string_values;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 15).unwrap()
    }

    #[test]
    fn generates_requested_rows_with_all_columns() {
        let df = generate(50, DEFAULT_SEED, today()).unwrap();
        assert_eq!(df.height(), 50);
        assert_eq!(df.width(), metadata::ALL.len());

        let accessions = string_values(&df, metadata::ACCESSION_ID).unwrap();
        assert_eq!(accessions[0].as_deref(), Some("EPI_FAKE_200000"));
        assert_eq!(accessions[49].as_deref(), Some("EPI_FAKE_200049"));

        let collected = string_values(&df, metadata::COLLECTION_DATE).unwrap();
        assert!(collected
            .iter()
            .flatten()
            .all(|d| d.as_str() >= "2021-06-01" && d.as_str() < "2022-01-15"));
    }

    #[test]
    fn same_seed_same_records() {
        let a = generate(20, 7, today()).unwrap();
        let b = generate(20, 7, today()).unwrap();
        assert!(a.equals(&b));
    }

    #[test]
    fn rejects_today_before_start() {
        let early = NaiveDate::from_ymd_opt(2021, 5, 1).unwrap();
        assert!(generate(5, 1, early).is_err());
    }
}
