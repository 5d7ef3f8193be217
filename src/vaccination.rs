use std::collections::HashSet;

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::normalize;
use crate::schema::{derived, vaccination};
use crate::table::{require_columns, string_values};

/// Weekly vaccination counts, one row per (country code, epiweek).
///
/// Rows are visited from the most recent report date backwards and the first
/// row seen for each key wins. Rows without a code or a parseable date are
/// skipped. Count columns are parsed to Float64 (unparseable values → null).
pub fn load_vaccinations(raw: &DataFrame) -> Result<DataFrame> {
    info!("Load vaccination reports ({} rows)", raw.height());
    require_columns(raw, &[vaccination::DATE, vaccination::ISO_CODE])?;
    require_columns(raw, &vaccination::COUNTS)?;

    let dates = string_values(raw, vaccination::DATE)?;
    let codes = string_values(raw, vaccination::ISO_CODE)?;
    let counts: Vec<Vec<Option<String>>> = vaccination::COUNTS
        .iter()
        .map(|name| string_values(raw, name))
        .collect::<Result<_>>()?;

    let mut order: Vec<usize> = (0..raw.height()).collect();
    order.sort_by(|&a, &b| dates[b].cmp(&dates[a]));

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut kept: Vec<(String, String, usize)> = Vec::new();
    for i in order {
        let (Some(code), Some(date)) = (&codes[i], &dates[i]) else {
            continue;
        };
        let Some(week) = normalize::to_epiweek(date.trim()) else {
            continue;
        };
        if seen.insert((code.clone(), week.clone())) {
            kept.push((code.clone(), week, i));
        }
    }
    kept.sort();

    let mut columns = vec![
        Column::new(
            derived::COUNTRY.into(),
            kept.iter().map(|(c, _, _)| c.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            derived::WEEK.into(),
            kept.iter().map(|(_, w, _)| w.clone()).collect::<Vec<_>>(),
        ),
    ];
    for (name, values) in vaccination::COUNTS.iter().zip(&counts) {
        let picked: Vec<Option<String>> = kept.iter().map(|(_, _, i)| values[*i].clone()).collect();
        columns.push(Column::new((*name).into(), picked));
    }

    let df = DataFrame::new(columns)?
        .lazy()
        .with_columns(
            vaccination::COUNTS
                .iter()
                .map(|name| {
                    col(*name)
                        .str()
                        .strip_chars(lit(" \t\r\n"))
                        .cast(DataType::Float64)
                })
                .collect::<Vec<_>>(),
        )
        .collect()?;
    info!("Kept {} weekly vaccination rows", df.height());
    Ok(df)
}

/// Inner join of the weekly table with vaccination counts on (Country, Week).
pub fn merge(aggregated: DataFrame, vaccinations: DataFrame) -> Result<DataFrame> {
    info!("Merge vaccinations ({} weekly rows)", aggregated.height());
    let keys = [col(derived::COUNTRY), col(derived::WEEK)];
    let df = aggregated
        .lazy()
        .join(
            vaccinations.lazy(),
            keys.clone(),
            keys.clone(),
            JoinArgs::new(JoinType::Inner),
        )
        .sort_by_exprs(keys, SortMultipleOptions::default())
        .collect()?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::float_values;

    fn reports() -> DataFrame {
        df!(
            vaccination::DATE => [Some("2021-12-13"), Some("2021-12-16"), Some("2021-12-20"), None, Some("2021-12-14")],
            vaccination::ISO_CODE => [Some("ARG"), Some("ARG"), Some("ARG"), Some("ARG"), None],
            vaccination::PEOPLE_VACCINATED => [Some("100"), Some("150"), Some("200"), Some("999"), Some("5")],
            vaccination::PEOPLE_FULLY_VACCINATED => [Some("50"), Some(" 80 "), Some("120"), None, None],
            vaccination::TOTAL_BOOSTERS => [None, Some("n/a"), Some("10"), None, None],
        )
        .unwrap()
    }

    #[test]
    fn latest_report_per_week_wins() {
        let df = load_vaccinations(&reports()).unwrap();
        assert_eq!(df.height(), 2);
        let weeks = string_values(&df, derived::WEEK).unwrap();
        assert_eq!(weeks, vec![Some("202150".to_string()), Some("202151".to_string())]);
        let vaccinated = float_values(&df, vaccination::PEOPLE_VACCINATED).unwrap();
        assert_eq!(vaccinated, vec![Some(150.0), Some(200.0)]);
        let fully = float_values(&df, vaccination::PEOPLE_FULLY_VACCINATED).unwrap();
        assert_eq!(fully, vec![Some(80.0), Some(120.0)]);
        let boosters = float_values(&df, vaccination::TOTAL_BOOSTERS).unwrap();
        assert_eq!(boosters, vec![None, Some(10.0)]);
    }

    #[test]
    fn merge_is_an_inner_join() {
        let weekly = df!(
            derived::COUNTRY => ["ARG", "ARG", "BRA"],
            derived::WEEK => ["202150", "202152", "202150"],
            derived::TOTAL => [3u32, 4, 5],
        )
        .unwrap();
        let merged = merge(weekly, load_vaccinations(&reports()).unwrap()).unwrap();
        assert_eq!(merged.height(), 1);
        let total = float_values(&merged, derived::TOTAL).unwrap();
        assert_eq!(total, vec![Some(3.0)]);
        assert!(merged.column(vaccination::PEOPLE_VACCINATED).is_ok());
    }
}
