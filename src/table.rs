use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::error::{Result, SurveillanceError};

/// Read a delimited file with all columns as String dtype.
/// Tab-separated when the file name ends in `.tsv`, comma-separated otherwise.
/// Trims whitespace from column names.
pub fn read_table_as_strings(path: &Path) -> Result<DataFrame> {
    let separator = match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") => b'\t',
        _ => b',',
    };
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .map_parse_options(|opts| opts.with_separator(separator))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

/// Write a table as comma-separated values with a header row.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Write a table as tab-separated values with a header row.
pub fn write_tsv<W: std::io::Write>(df: &mut DataFrame, writer: W) -> Result<()> {
    CsvWriter::new(writer)
        .include_header(true)
        .with_separator(b'\t')
        .finish(df)?;
    Ok(())
}

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(SurveillanceError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Owned string values of a column (nulls and blank strings as `None`).
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| SurveillanceError::MissingColumn(name.to_string()))?;
    let values = column
        .str()?
        .into_iter()
        .map(|v| v.filter(|s| !s.trim().is_empty()).map(str::to_string))
        .collect();
    Ok(values)
}

/// Float values of a column of any numeric dtype.
pub fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| SurveillanceError::MissingColumn(name.to_string()))?
        .cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Keep the rows whose mask entry is true.
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::new("mask".into(), keep);
    Ok(df.filter(&mask)?)
}
