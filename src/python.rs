use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::aggregation;
use crate::config::{AnalysisConfig, InputPaths, OutputLayout};
use crate::dominance;
use crate::model::SurveillanceModel;
use crate::normalize;
use crate::reference::ReferenceData;
use crate::schema;
use crate::vaccination;

#[pyclass(name = "Surveillance")]
pub struct PySurveillance {
    model: SurveillanceModel,
}

#[pymethods]
impl PySurveillance {
    /// Build a pipeline from reference files and analysis options.
    ///
    /// `regions` is a comma-separated allow-list and requires `country`.
    #[new]
    #[pyo3(signature = (
        countries,
        genders = None,
        country = None,
        regions = None,
        filter_age = false,
        filter_gender = false,
        group_by_age = false,
        group_by_gender = false,
        variants = None,
        threshold = dominance::DEFAULT_THRESHOLD,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        countries: PathBuf,
        genders: Option<PathBuf>,
        country: Option<String>,
        regions: Option<String>,
        filter_age: bool,
        filter_gender: bool,
        group_by_age: bool,
        group_by_gender: bool,
        variants: Option<Vec<String>>,
        threshold: f64,
    ) -> PyResult<Self> {
        let defaults = AnalysisConfig::default();
        let config = AnalysisConfig {
            country,
            regions: regions.as_deref().map(AnalysisConfig::parse_regions),
            filter_age,
            filter_gender,
            group_by_age,
            group_by_gender,
            variants: variants.unwrap_or(defaults.variants),
            threshold,
        };
        config.validate()?;
        let reference = ReferenceData::load(&countries, genders.as_deref())?;
        Ok(Self {
            model: SurveillanceModel::new(reference, config),
        })
    }

    /// Host, location, age/gender and temporal stages on a raw metadata table.
    fn prepare_records(&self, raw: PyDataFrame) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.model.prepare_records(raw.0)?))
    }

    /// Weekly variant counts, stratified as configured.
    fn weekly(&self, records: PyDataFrame) -> PyResult<PyDataFrame> {
        let grouping = self.model.config().grouping();
        Ok(PyDataFrame(self.model.weekly(records.0, grouping)?))
    }

    fn completeness(&self, records: PyDataFrame) -> PyResult<PyDataFrame> {
        let countries = self.model.report_countries();
        let df = aggregation::calculate_completeness(&records.0, &countries)?;
        Ok(PyDataFrame(df))
    }

    /// Tab-separated gender sets, one line per country.
    fn gender_report(&self, records: PyDataFrame) -> PyResult<String> {
        let countries = self.model.report_countries();
        let diversity = aggregation::gender_diversity(&records.0, &countries)?;
        Ok(aggregation::gender_report(&diversity))
    }

    fn dominance(&self, weekly: PyDataFrame) -> PyResult<PyDataFrame> {
        let config = self.model.config();
        let windows =
            dominance::dominance_windows(&weekly.0, &config.variants, config.threshold)?;
        Ok(PyDataFrame(dominance::dominance_table(&windows)?))
    }

    /// Full run from files; returns the number of records after filtering.
    #[pyo3(signature = (metadata, output, vaccinations = None))]
    fn run(
        &self,
        metadata: PathBuf,
        output: PathBuf,
        vaccinations: Option<PathBuf>,
    ) -> PyResult<usize> {
        let inputs = InputPaths {
            metadata,
            vaccinations,
            ..Default::default()
        };
        let summary = self.model.run(&inputs, &OutputLayout::new(output))?;
        Ok(summary.records)
    }
}

#[pyfunction]
fn to_epiweek(date: &str) -> Option<String> {
    normalize::to_epiweek(date)
}

#[pyfunction]
#[pyo3(signature = (age_lower, age_upper))]
fn age_to_bucket(age_lower: Option<f64>, age_upper: Option<f64>) -> String {
    normalize::age_to_bucket(age_lower, age_upper)
}

#[pyfunction]
#[pyo3(signature = (variant_text, tracked_variant))]
fn variant_flag(variant_text: Option<&str>, tracked_variant: &str) -> bool {
    normalize::variant_flag(variant_text, tracked_variant)
}

#[pyfunction]
fn load_vaccinations(raw: PyDataFrame) -> PyResult<PyDataFrame> {
    Ok(PyDataFrame(vaccination::load_vaccinations(&raw.0)?))
}

#[pyfunction]
fn merge_vaccinations(weekly: PyDataFrame, vaccinations: PyDataFrame) -> PyResult<PyDataFrame> {
    Ok(PyDataFrame(vaccination::merge(weekly.0, vaccinations.0)?))
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let metadata = PyModule::new(m.py(), "metadata")?;
    metadata.add("ALL", schema::metadata::ALL.to_vec())?;
    metadata.add("HUMAN_HOST", schema::metadata::HUMAN_HOST)?;
    m.add_submodule(&metadata)?;

    let derived = PyModule::new(m.py(), "derived")?;
    derived.add("COUNTRY", schema::derived::COUNTRY)?;
    derived.add("REGION", schema::derived::REGION)?;
    derived.add("WEEK", schema::derived::WEEK)?;
    derived.add("OTHER_VARIANTS", schema::derived::OTHER_VARIANTS)?;
    derived.add("TOTAL", schema::derived::TOTAL)?;
    derived.add("AGE_LOWER", schema::derived::AGE_LOWER)?;
    derived.add("AGE_UPPER", schema::derived::AGE_UPPER)?;
    derived.add("AGE_GROUP", schema::derived::AGE_GROUP)?;
    m.add_submodule(&derived)?;

    let vaccination = PyModule::new(m.py(), "vaccination")?;
    vaccination.add("DATE", schema::vaccination::DATE)?;
    vaccination.add("ISO_CODE", schema::vaccination::ISO_CODE)?;
    vaccination.add("COUNTS", schema::vaccination::COUNTS.to_vec())?;
    m.add_submodule(&vaccination)?;

    let dominance = PyModule::new(m.py(), "dominance")?;
    dominance.add("COUNTRY", schema::dominance::COUNTRY)?;
    dominance.add("VARIANT", schema::dominance::VARIANT)?;
    dominance.add("START_WEEK", schema::dominance::START_WEEK)?;
    dominance.add("END_WEEK", schema::dominance::END_WEEK)?;
    dominance.add("THRESHOLD", schema::dominance::THRESHOLD)?;
    m.add_submodule(&dominance)?;

    Ok(())
}

#[pymodule]
fn epi_variants(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySurveillance>()?;
    m.add_function(wrap_pyfunction!(to_epiweek, m)?)?;
    m.add_function(wrap_pyfunction!(age_to_bucket, m)?)?;
    m.add_function(wrap_pyfunction!(variant_flag, m)?)?;
    m.add_function(wrap_pyfunction!(load_vaccinations, m)?)?;
    m.add_function(wrap_pyfunction!(merge_vaccinations, m)?)?;
    add_schema_exports(m)?;
    Ok(())
}
