use thiserror::Error;

pub type Result<T> = std::result::Result<T, HazardError>;

#[derive(Error, Debug)]
pub enum HazardError {
    #[error("can't read dataset '{path}': {reason}")]
    DataSourceNotFound { path: String, reason: String },

    #[error("dataset is missing required column(s): {}", missing.join(", "))]
    MissingRequiredColumns { missing: Vec<String> },

    #[error("none of the candidate covariates are in the dataset (wanted: {})", candidates.join(", "))]
    NoUsableCovariates { candidates: Vec<String> },

    #[error("bad value in column '{column}' at row {row}: {value:?}")]
    InvalidValue { column: String, row: usize, value: String },

    // solver errors pass through untouched
    #[error(transparent)]
    ModelFit(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("rendering failed: {message}")]
    Render { message: String },
}

impl HazardError {
    pub fn data_source_not_found(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::DataSourceNotFound {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_required_columns(missing: Vec<String>) -> Self {
        Self::MissingRequiredColumns { missing }
    }

    pub fn no_usable_covariates(candidates: &[String]) -> Self {
        Self::NoUsableCovariates { candidates: candidates.to_vec() }
    }

    pub fn invalid_value(column: impl Into<String>, row: usize, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.into(),
            row,
            value: value.into(),
        }
    }

    pub fn model_fit<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ModelFit(Box::new(err))
    }

    pub fn render(message: impl ToString) -> Self {
        Self::Render { message: message.to_string() }
    }

    /// true for the loader's validation failures - the variant halts, nothing else does
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DataSourceNotFound { .. }
                | Self::MissingRequiredColumns { .. }
                | Self::NoUsableCovariates { .. }
                | Self::InvalidValue { .. }
        )
    }
}

