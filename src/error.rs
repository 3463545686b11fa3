use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid dataset specifier: {0}")]
    InvalidSpecifier(String),

    #[error("invalid competition slug: {0}")]
    InvalidCompetitionSlug(String),

    #[error("invalid dataset reference: {0}")]
    InvalidDatasetRef(String),

    #[error("missing config file kagfetch.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no Kaggle credentials: set KAGGLE_USERNAME/KAGGLE_KEY or create {0}")]
    CredentialsMissing(PathBuf),

    #[error("invalid Kaggle credentials: {0}")]
    CredentialsInvalid(String),

    #[error("Kaggle rejected the credentials (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Kaggle request failed: {0}")]
    Http(String),

    #[error("Kaggle returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl FetchError {
    /// Credential problems, whether local (missing/unparseable key file) or
    /// rejected by the server.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            FetchError::CredentialsMissing(_)
                | FetchError::CredentialsInvalid(_)
                | FetchError::Unauthorized { .. }
        )
    }
}
