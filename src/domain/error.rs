//! Domain error types.

/// Top-level error type for retcorr.
#[derive(Debug, thiserror::Error)]
pub enum CorrError {
    #[error("data store error: {reason}")]
    Data { reason: String },

    #[error("data store query error: {reason}")]
    DataQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no artifact at {path}")]
    MissingArtifact { path: String },

    #[error("malformed artifact {path}: {reason}")]
    Artifact { path: String, reason: String },

    #[error("invalid frame shape: {reason}")]
    Shape { reason: String },

    #[error("need at least {needed} columns, found {found}")]
    InsufficientColumns { needed: usize, found: usize },

    #[error("invalid window {window}: {reason}")]
    InvalidWindow { window: usize, reason: String },

    #[error("degenerate pair: {reason}")]
    DegeneratePair { reason: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CorrError {
    /// True when the error means a stage input has not been produced yet.
    pub fn is_missing_artifact(&self) -> bool {
        matches!(self, CorrError::MissingArtifact { .. })
    }
}

impl From<&CorrError> for std::process::ExitCode {
    fn from(err: &CorrError) -> Self {
        let code: u8 = match err {
            CorrError::Io(_) | CorrError::MissingArtifact { .. } | CorrError::Artifact { .. } => 1,
            CorrError::ConfigParse { .. }
            | CorrError::ConfigMissing { .. }
            | CorrError::ConfigInvalid { .. } => 2,
            CorrError::Data { .. } | CorrError::DataQuery { .. } => 3,
            CorrError::Shape { .. }
            | CorrError::InsufficientColumns { .. }
            | CorrError::InvalidWindow { .. }
            | CorrError::DegeneratePair { .. }
            | CorrError::InvalidInput { .. } => 4,
            CorrError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
