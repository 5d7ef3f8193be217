use std::fs;

use polars::prelude::*;
use tracing::{info, warn};

use crate::aggregation::{self, Grouping};
use crate::config::{AnalysisConfig, InputPaths, OutputLayout};
use crate::dominance::{self, DominanceWindow};
use crate::error::Result;
use crate::filters;
use crate::reference::ReferenceData;
use crate::table::{read_table_as_strings, write_csv};
use crate::vaccination;

/// Tables produced by one run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: usize,
    pub completeness: DataFrame,
    pub genders: Vec<(String, Vec<String>)>,
    pub weekly: DataFrame,
    pub dominance: Vec<DominanceWindow>,
}

/// One batch run over a metadata file: filter, normalize, aggregate, report.
pub struct SurveillanceModel {
    reference: ReferenceData,
    config: AnalysisConfig,
}

impl SurveillanceModel {
    pub fn new(reference: ReferenceData, config: AnalysisConfig) -> Self {
        Self { reference, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    // ── Stages ──────────────────────────────────────────────────────────────

    /// Filter chain from raw metadata to the validated record set.
    pub fn prepare_records(&self, raw: DataFrame) -> Result<DataFrame> {
        let country = self.config.country.as_deref();

        let mut df = filters::filter_human_hosts(raw)?;
        df = filters::parse_locations(df, &self.reference.countries)?;
        df = filters::filter_location(
            df,
            &self.reference.countries,
            country,
            self.config.regions.as_deref(),
        )?;

        let needs_reconcile = self.config.filter_age
            || self.config.filter_gender
            || self.config.group_by_age
            || self.config.group_by_gender;
        if needs_reconcile {
            df = filters::reconcile_age_gender(df, &self.reference.genders)?;
        }
        if self.config.filter_age {
            df = filters::filter_valid_age(df, country)?;
        }
        if self.config.group_by_age {
            df = filters::add_age_groups(df, country)?;
        }
        if self.config.filter_gender {
            df = filters::map_genders(df, &self.reference.genders, country)?;
        }

        filters::check_collection_before_submission(df)
    }

    /// Countries reported in the completeness and gender tables.
    pub fn report_countries(&self) -> Vec<String> {
        match &self.config.country {
            Some(country) => vec![country.clone()],
            None => self.reference.countries.codes(),
        }
    }

    /// Epiweek and variant annotation followed by aggregation.
    pub fn weekly(&self, records: DataFrame, grouping: Grouping) -> Result<DataFrame> {
        let df = aggregation::calculate_epiweeks(records)?;
        let df = aggregation::add_variant_columns(df, &self.config.variants)?;
        aggregation::aggregate(df, &self.config.variants, grouping)
    }

    /// Run every stage on in-memory tables, without touching the filesystem.
    pub fn analyse(&self, raw: DataFrame, vaccinations: Option<&DataFrame>) -> Result<RunSummary> {
        self.config.validate()?;
        let records = self.prepare_records(raw)?;
        info!("{} records after filtering", records.height());

        let countries = self.report_countries();
        let completeness = aggregation::calculate_completeness(&records, &countries)?;
        let genders = aggregation::gender_diversity(&records, &countries)?;

        let grouping = self.config.grouping();
        let unstratified = self.weekly(records.clone(), Grouping::default())?;
        let mut weekly = if grouping.is_stratified() {
            self.weekly(records.clone(), grouping)?
        } else {
            unstratified.clone()
        };

        match (vaccinations, &self.config.country) {
            (Some(raw_vaccinations), None) => {
                let vaccinations = vaccination::load_vaccinations(raw_vaccinations)?;
                weekly = vaccination::merge(weekly, vaccinations)?;
            }
            (Some(_), Some(country)) => {
                warn!("Vaccinations are only merged into the all-countries summary, skipping for {country}");
            }
            (None, _) => {}
        }

        // Shares come from per-(country, week) totals; a stratified table would split them.
        let dominance_source = if grouping.is_stratified() {
            &unstratified
        } else {
            &weekly
        };
        let dominance = dominance::dominance_windows(
            dominance_source,
            &self.config.variants,
            self.config.threshold,
        )?;

        Ok(RunSummary {
            records: records.height(),
            completeness,
            genders,
            weekly,
            dominance,
        })
    }

    // ── Full run ────────────────────────────────────────────────────────────

    /// Read the inputs, analyse and write every output table.
    pub fn run(&self, inputs: &InputPaths, layout: &OutputLayout) -> Result<RunSummary> {
        self.config.validate()?;

        info!("Read metadata < {}", inputs.metadata.display());
        let raw = read_table_as_strings(&inputs.metadata)?;
        let vaccinations = match &inputs.vaccinations {
            Some(path) => {
                info!("Read vaccinations < {}", path.display());
                Some(read_table_as_strings(path)?)
            }
            None => None,
        };

        let summary = self.analyse(raw, vaccinations.as_ref())?;
        self.write_outputs(&summary, layout)?;
        Ok(summary)
    }

    pub fn write_outputs(&self, summary: &RunSummary, layout: &OutputLayout) -> Result<()> {
        let config = &self.config;
        fs::create_dir_all(layout.directory(config))?;

        let path = layout.path(config, "completeness", "csv");
        info!("Write completeness > {}", path.display());
        write_csv(&mut summary.completeness.clone(), &path)?;

        let path = layout.path(config, "gender", "txt");
        info!("Write gender sets > {}", path.display());
        fs::write(&path, aggregation::gender_report(&summary.genders))?;

        let path = layout.path(config, "weekly", "csv");
        info!("Write weekly table > {}", path.display());
        write_csv(&mut summary.weekly.clone(), &path)?;

        let path = layout.path(config, "dominance", "csv");
        info!("Write dominance windows > {}", path.display());
        write_csv(&mut dominance::dominance_table(&summary.dominance)?, &path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurveillanceError;
    use crate::reference::{CountryReferenceMap, GenderVocabulary};
    use crate::schema::{derived, metadata, vaccination};
    use crate::table::string_values;

    fn reference() -> ReferenceData {
        ReferenceData::new(
            CountryReferenceMap::from_pairs([("Argentina", "ARG"), ("Brazil", "BRA")]),
            GenderVocabulary::default(),
        )
    }

    fn raw() -> DataFrame {
        df!(
            metadata::ACCESSION_ID => ["EPI_1", "EPI_2", "EPI_3", "EPI_4"],
            metadata::HOST => ["Human", "Human", "Human", "Mouse"],
            metadata::LOCATION => [
                "South America / Argentina / Buenos Aires",
                "South America / Argentina / Cordoba",
                "South America / Brazil / Sao Paulo",
                "South America / Brazil / Sao Paulo",
            ],
            metadata::PATIENT_AGE => ["20", "Female", "65", "3"],
            metadata::GENDER => ["Male", "24", "Female", "Male"],
            metadata::VARIANT => ["VOC Omicron GRA", "VOC Omicron GRA", "VOC Delta GK", "VOC Delta GK"],
            metadata::COLLECTION_DATE => ["2021-12-12", "2021-12-13", "2021-12-12", "2021-12-12"],
            metadata::SUBMISSION_DATE => ["2021-12-20", "2021-12-20", "2021-12-20", "2021-12-20"],
        )
        .unwrap()
    }

    #[test]
    fn analyse_all_countries() {
        let model = SurveillanceModel::new(reference(), AnalysisConfig::default());
        let summary = model.analyse(raw(), None).unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.completeness.height(), 2);
        assert_eq!(summary.weekly.height(), 2);
        assert_eq!(summary.dominance.len(), 4);
        assert_eq!(summary.dominance[0].start_week.as_deref(), Some("202150"));
    }

    #[test]
    fn analyse_single_country_stratified() {
        let config = AnalysisConfig {
            country: Some("ARG".to_string()),
            filter_age: true,
            group_by_age: true,
            group_by_gender: true,
            ..Default::default()
        };
        let model = SurveillanceModel::new(reference(), config);
        let summary = model.analyse(raw(), None).unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.completeness.height(), 1);
        assert_eq!(summary.weekly.height(), 2);
        assert!(summary.weekly.column(derived::AGE_GROUP).is_ok());
        assert!(summary.weekly.column(metadata::GENDER).is_ok());
        // dominance always uses the unstratified weekly table
        assert_eq!(summary.dominance.len(), 2);
    }

    #[test]
    fn dominance_follows_the_merged_weeks() {
        let raw = df!(
            metadata::ACCESSION_ID => ["EPI_1", "EPI_2", "EPI_3"],
            metadata::HOST => ["Human", "Human", "Human"],
            metadata::LOCATION => [
                "South America / Argentina",
                "South America / Argentina",
                "South America / Argentina",
            ],
            metadata::VARIANT => ["VOC Omicron GRA", "VOC Omicron GRA", "VOC Delta GK"],
            metadata::COLLECTION_DATE => ["2021-12-05", "2021-12-12", "2021-12-19"],
            metadata::SUBMISSION_DATE => ["2021-12-25", "2021-12-25", "2021-12-25"],
        )
        .unwrap();
        // no report for 202149, the first week Omicron dominates
        let vaccinations = df!(
            vaccination::DATE => ["2021-12-13", "2021-12-20"],
            vaccination::ISO_CODE => ["ARG", "ARG"],
            vaccination::PEOPLE_VACCINATED => ["10", "20"],
            vaccination::PEOPLE_FULLY_VACCINATED => ["5", "10"],
            vaccination::TOTAL_BOOSTERS => ["1", "2"],
        )
        .unwrap();

        let model = SurveillanceModel::new(reference(), AnalysisConfig::default());
        let summary = model.analyse(raw, Some(&vaccinations)).unwrap();

        let weeks = string_values(&summary.weekly, derived::WEEK).unwrap();
        assert_eq!(weeks, vec![Some("202150".to_string()), Some("202151".to_string())]);
        let omicron = &summary.dominance[0];
        assert_eq!(omicron.variant, "Omicron");
        assert_eq!(omicron.start_week.as_deref(), Some("202150"));
        assert_eq!(omicron.end_week.as_deref(), Some("202151"));
        let delta = &summary.dominance[1];
        assert_eq!(delta.start_week.as_deref(), Some("202151"));
        assert_eq!(delta.end_week, None);
    }

    #[test]
    fn usage_errors_come_first() {
        let config = AnalysisConfig {
            group_by_age: true,
            ..Default::default()
        };
        let model = SurveillanceModel::new(reference(), config);
        assert!(matches!(
            model.analyse(raw(), None),
            Err(SurveillanceError::Usage(_))
        ));
    }
}
