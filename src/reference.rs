//! Static reference tables: country name → ISO3 code, and per-country gender vocabularies.
//!
//! Both are loaded once at startup and passed by reference into the stages
//! that need them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SurveillanceError};

/// Canonical gender labels produced by the gender-mapping stage.
pub const FEMALE: &str = "Female";
pub const MALE: &str = "Male";

/// Gender tokens recognized in any country, compared case-insensitively.
const BUILTIN_GENDER_TOKENS: [&str; 6] = ["m", "f", "male", "female", "man", "woman"];

#[derive(Debug, Clone, Default)]
pub struct CountryReferenceMap {
    by_name: HashMap<String, String>,
}

impl CountryReferenceMap {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SurveillanceError::Reference(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let by_name: HashMap<String, String> = serde_json::from_str(text)?;
        Ok(Self { by_name })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            by_name: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// ISO3 code for a country display name, if mapped.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    /// Sorted distinct ISO3 codes.
    pub fn codes(&self) -> Vec<String> {
        self.by_name
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.by_name.values().any(|c| c == code)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// A vocabulary entry may list a single token or several.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Tokens {
    One(String),
    Many(Vec<String>),
}

impl Tokens {
    fn into_vec(self) -> Vec<String> {
        match self {
            Tokens::One(t) => vec![t],
            Tokens::Many(ts) => ts,
        }
    }
}

/// Per-country mapping from canonical label ("Female"/"Male") to locale tokens.
#[derive(Debug, Clone, Default)]
pub struct GenderVocabulary {
    by_country: HashMap<String, BTreeMap<String, Vec<String>>>,
}

impl GenderVocabulary {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SurveillanceError::Reference(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: HashMap<String, BTreeMap<String, Tokens>> = serde_json::from_str(text)?;
        let by_country = raw
            .into_iter()
            .map(|(country, labels)| {
                let labels = labels
                    .into_iter()
                    .map(|(label, tokens)| {
                        let tokens = tokens
                            .into_vec()
                            .into_iter()
                            .map(|t| t.trim().to_lowercase())
                            .collect();
                        (label, tokens)
                    })
                    .collect();
                (country, labels)
            })
            .collect();
        Ok(Self { by_country })
    }

    fn default_entry() -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            (FEMALE.to_string(), vec!["female".to_string()]),
            (MALE.to_string(), vec!["male".to_string()]),
        ])
    }

    /// Vocabulary for one country, falling back to plain "female"/"male".
    pub fn for_country(&self, code: &str) -> BTreeMap<String, Vec<String>> {
        self.by_country
            .get(code)
            .cloned()
            .unwrap_or_else(Self::default_entry)
    }

    /// Canonical label for a raw gender token in the given country.
    pub fn canonical(&self, code: &str, token: &str) -> Option<String> {
        let needle = token.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let matches = |labels: &BTreeMap<String, Vec<String>>| {
            labels
                .iter()
                .find(|(_, tokens)| tokens.iter().any(|t| *t == needle))
                .map(|(label, _)| label.clone())
        };
        match self.by_country.get(code) {
            Some(labels) => matches(labels),
            None => matches(&Self::default_entry()),
        }
    }

    /// Whether the token reads as a gender in any known vocabulary.
    pub fn is_known_token(&self, token: &str) -> bool {
        let needle = token.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        BUILTIN_GENDER_TOKENS.contains(&needle.as_str())
            || self
                .by_country
                .values()
                .flat_map(|labels| labels.values())
                .any(|tokens| tokens.iter().any(|t| *t == needle))
    }
}

/// Reference tables bundled for a run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub countries: CountryReferenceMap,
    pub genders: GenderVocabulary,
}

impl ReferenceData {
    pub fn new(countries: CountryReferenceMap, genders: GenderVocabulary) -> Self {
        Self { countries, genders }
    }

    /// Load the country map and, when the file exists, the gender vocabulary.
    pub fn load(countries: &Path, genders: Option<&Path>) -> Result<Self> {
        let countries = CountryReferenceMap::from_json_file(countries)?;
        let genders = match genders {
            Some(path) if path.exists() => GenderVocabulary::from_json_file(path)?,
            Some(path) => {
                tracing::warn!(
                    "Gender vocabulary {} not found, using defaults",
                    path.display()
                );
                GenderVocabulary::default()
            }
            None => GenderVocabulary::default(),
        };
        Ok(Self { countries, genders })
    }
}
