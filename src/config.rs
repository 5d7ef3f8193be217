use std::path::{Path, PathBuf};

use crate::aggregation::Grouping;
use crate::dominance::DEFAULT_THRESHOLD;
use crate::error::{Result, SurveillanceError};

pub const DEFAULT_VARIANTS: [&str; 2] = ["Omicron", "Delta"];

/// Which records to analyse and how to stratify them.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// ISO3 code of the single country under observation.
    pub country: Option<String>,
    pub regions: Option<Vec<String>>,
    pub filter_age: bool,
    pub filter_gender: bool,
    pub group_by_age: bool,
    pub group_by_gender: bool,
    pub variants: Vec<String>,
    pub threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            country: None,
            regions: None,
            filter_age: false,
            filter_gender: false,
            group_by_age: false,
            group_by_gender: false,
            variants: DEFAULT_VARIANTS.iter().map(|v| v.to_string()).collect(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl AnalysisConfig {
    /// Split a comma-separated region allow-list, ignoring blank entries.
    pub fn parse_regions(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn grouping(&self) -> Grouping {
        Grouping {
            by_age: self.group_by_age,
            by_gender: self.group_by_gender,
        }
    }

    /// Reject option combinations before any processing starts.
    pub fn validate(&self) -> Result<()> {
        if self.country.is_none() {
            if self.regions.is_some() {
                return Err(SurveillanceError::Usage(
                    "If you specify region, country ISO3 code has to be specified as well".into(),
                ));
            }
            let per_country = [
                (self.filter_age, "--filter-age"),
                (self.filter_gender, "--filter-gender"),
                (self.group_by_age, "--group-by-age"),
                (self.group_by_gender, "--group-by-gender"),
            ];
            if let Some((_, flag)) = per_country.iter().find(|(on, _)| *on) {
                return Err(SurveillanceError::Usage(format!(
                    "{flag} requires --country"
                )));
            }
        }
        if matches!(&self.regions, Some(r) if r.is_empty()) {
            return Err(SurveillanceError::Usage("Region list is empty".into()));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(SurveillanceError::Usage(format!(
                "Threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        if self.variants.is_empty() {
            return Err(SurveillanceError::Usage(
                "At least one variant must be tracked".into(),
            ));
        }
        Ok(())
    }
}

/// Input files for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPaths {
    pub metadata: PathBuf,
    pub countries: PathBuf,
    pub genders: Option<PathBuf>,
    pub vaccinations: Option<PathBuf>,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            metadata: PathBuf::from("gisaid/metadata.tsv"),
            countries: PathBuf::from("data/countries.json"),
            genders: Some(PathBuf::from("data/gender.json")),
            vaccinations: None,
        }
    }
}

/// Where output tables are written and how they are named.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    pub root: PathBuf,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("output"),
        }
    }
}

impl OutputLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Output directory: the root, or `<root>/<ISO3>` for a single country.
    pub fn directory(&self, config: &AnalysisConfig) -> PathBuf {
        match &config.country {
            Some(country) => self.root.join(country),
            None => self.root.clone(),
        }
    }

    /// File name for one output table, e.g. `ARG_weekly_age_group.csv`.
    pub fn file_name(&self, config: &AnalysisConfig, stem: &str, extension: &str) -> String {
        let Some(country) = &config.country else {
            return format!("{stem}.{extension}");
        };
        let mut name = format!("{country}_{stem}");
        if let Some(regions) = &config.regions {
            let joined = regions
                .iter()
                .map(|r| r.replace(|c: char| !c.is_alphanumeric(), "-"))
                .collect::<Vec<_>>()
                .join("-");
            name.push('_');
            name.push_str(&joined);
        }
        if config.filter_age {
            name.push_str("_age");
        }
        if config.filter_gender {
            name.push_str("_gender");
        }
        if config.grouping().is_stratified() {
            name.push_str("_group");
        }
        format!("{name}.{extension}")
    }

    pub fn path(&self, config: &AnalysisConfig, stem: &str, extension: &str) -> PathBuf {
        self.directory(config)
            .join(self.file_name(config, stem, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn for_country(country: &str) -> AnalysisConfig {
        AnalysisConfig {
            country: Some(country.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.variants, vec!["Omicron".to_string(), "Delta".to_string()]);
        assert_eq!(config.threshold, 0.9);
    }

    #[test]
    fn region_requires_country() {
        let config = AnalysisConfig {
            regions: Some(vec!["Buenos Aires".to_string()]),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SurveillanceError::Usage(_))));
    }

    #[test]
    fn per_country_switches_require_country() {
        for config in [
            AnalysisConfig { filter_age: true, ..Default::default() },
            AnalysisConfig { filter_gender: true, ..Default::default() },
            AnalysisConfig { group_by_age: true, ..Default::default() },
            AnalysisConfig { group_by_gender: true, ..Default::default() },
        ] {
            assert!(matches!(config.validate(), Err(SurveillanceError::Usage(_))));
        }
        let config = AnalysisConfig {
            filter_age: true,
            group_by_gender: true,
            ..for_country("ARG")
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn threshold_and_variants_are_checked() {
        let config = AnalysisConfig { threshold: 1.5, ..Default::default() };
        assert!(config.validate().is_err());
        let config = AnalysisConfig { variants: vec![], ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn regions_are_split_on_commas() {
        assert_eq!(
            AnalysisConfig::parse_regions("Buenos Aires, Cordoba,,"),
            vec!["Buenos Aires".to_string(), "Cordoba".to_string()]
        );
    }

    #[test]
    fn output_names_follow_active_filters() {
        let layout = OutputLayout::new("out");
        let all = AnalysisConfig::default();
        assert_eq!(layout.path(&all, "weekly", "csv"), PathBuf::from("out/weekly.csv"));

        let arg = for_country("ARG");
        assert_eq!(layout.path(&arg, "weekly", "csv"), PathBuf::from("out/ARG/ARG_weekly.csv"));

        let detailed = AnalysisConfig {
            regions: Some(vec!["Buenos Aires".to_string(), "Cordoba".to_string()]),
            filter_age: true,
            group_by_age: true,
            ..for_country("ARG")
        };
        assert_eq!(
            layout.file_name(&detailed, "weekly", "csv"),
            "ARG_weekly_Buenos-Aires-Cordoba_age_group.csv"
        );
    }
}
