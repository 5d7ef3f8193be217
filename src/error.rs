#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SurveillanceError>;

#[derive(Error, Debug)]
pub enum SurveillanceError {
    /// Invalid option combination, detected before any processing starts.
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Collection date after submission date in the filtered record set.
    #[error(
        "{count} records have a collection date after their submission date (first: {})",
        accessions.join(", ")
    )]
    TemporalViolation {
        count: usize,
        accessions: Vec<String>,
    },

    #[error("Reference data: {0}")]
    Reference(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    General(String),
}

#[cfg(feature = "python")]
impl From<SurveillanceError> for PyErr {
    fn from(err: SurveillanceError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<PyErr> for SurveillanceError {
    fn from(err: PyErr) -> Self {
        SurveillanceError::General(err.to_string())
    }
}
