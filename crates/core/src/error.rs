use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Malformed pagination/sort/filter parameters. Raised before any data access.
    #[error("invalid `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The snapshot provider could not supply the identity universe.
    #[error("snapshot provider unavailable: {0:#}")]
    Upstream(anyhow::Error),
}

impl AnalyzerError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
