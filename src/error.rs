use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AvisetError {
    #[error("invalid species name: {0}")]
    InvalidCategory(String),

    #[error("missing species file at {0}")]
    MissingSpeciesFile(PathBuf),

    #[error("failed to read species file at {0}")]
    SpeciesFileRead(PathBuf),

    #[error("no API key supplied (use --api-key or the AVISET_API_KEY env var)")]
    MissingApiKey,

    #[error("search request failed: {0}")]
    SearchHttp(String),

    #[error("search returned status {status}: {message}")]
    SearchStatus { status: u16, message: String },

    #[error("corrupt ledger {path}: first line {line:?} is not an integer")]
    LedgerCorrupt { path: PathBuf, line: String },

    #[error("no ledger found for species {0} (run `aviset collect` first)")]
    LedgerMissing(String),

    #[error("classifier request failed: {0}")]
    ClassifierHttp(String),

    #[error("classifier returned status {status}: {message}")]
    ClassifierStatus { status: u16, message: String },

    #[error("cannot classify {0}: not a png or jpeg file")]
    UnsupportedImageType(String),

    #[error("invalid test fraction {0}: must be between 0.0 and 1.0")]
    InvalidTestFraction(f64),

    #[error("missing images directory at {0} (run `aviset download` first)")]
    MissingImagesDir(PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl AvisetError {
    /// Process exit code: 2 for configuration and data-corruption errors,
    /// 3 for provider/classifier HTTP failures, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            AvisetError::MissingApiKey
            | AvisetError::MissingSpeciesFile(_)
            | AvisetError::SpeciesFileRead(_)
            | AvisetError::LedgerCorrupt { .. }
            | AvisetError::LedgerMissing(_)
            | AvisetError::InvalidTestFraction(_)
            | AvisetError::MissingImagesDir(_) => 2,
            AvisetError::SearchHttp(_)
            | AvisetError::SearchStatus { .. }
            | AvisetError::ClassifierHttp(_)
            | AvisetError::ClassifierStatus { .. } => 3,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_class() {
        assert_eq!(AvisetError::MissingApiKey.exit_code(), 2);
        assert_eq!(
            AvisetError::MissingImagesDir(PathBuf::from("images")).exit_code(),
            2
        );
        assert_eq!(AvisetError::InvalidTestFraction(2.0).exit_code(), 2);
        assert_eq!(
            AvisetError::SearchStatus {
                status: 503,
                message: "unavailable".to_string(),
            }
            .exit_code(),
            3
        );
        assert_eq!(AvisetError::Filesystem("oops".to_string()).exit_code(), 1);
    }
}
