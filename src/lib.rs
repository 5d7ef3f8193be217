//! Weekly per-country variant time series from sequencing metadata.
//!
//! Raw submission records are normalized (location, age/gender, epiweek,
//! variant flags), filtered, aggregated per (country, week) and extended with
//! vaccination counts and variant dominance windows.

pub mod aggregation;
pub mod config;
pub mod correlation;
pub mod dominance;
pub mod error;
pub mod filters;
pub mod model;
pub mod normalize;
pub mod reference;
pub mod schema;
pub mod synthetic;
pub mod table;
pub mod vaccination;

#[cfg(feature = "python")]
mod python;

pub use config::{AnalysisConfig, InputPaths, OutputLayout};
pub use error::{Result, SurveillanceError};
pub use model::{RunSummary, SurveillanceModel};
pub use reference::{CountryReferenceMap, GenderVocabulary, ReferenceData};
