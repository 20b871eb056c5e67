use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid ChEMBL id: {0}")]
    InvalidChemblId(String),

    #[error("invalid taxon id: {0}")]
    InvalidTaxonId(String),

    #[error("invalid compound query: {0}")]
    InvalidCompound(String),

    #[error("taxon not found: {0}")]
    TaxonNotFound(String),

    #[error("compound not found: {0}")]
    CompoundNotFound(String),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("no canonical target found for {0}")]
    #[diagnostic(help(
        "none of the target's ancestors has an acceptable type; the target cannot be canonicalized"
    ))]
    NoCanonicalTarget(String),

    #[error("failed {search_key} [{search_class}] on compound {compound}")]
    Search {
        compound: String,
        search_key: String,
        search_class: String,
        #[source]
        source: Box<KiraError>,
    },

    #[error("search source {source_name} (key {key}) does not exist")]
    UnknownSearch { source_name: String, key: String },

    #[error("repeated search key '{0}'")]
    DuplicateSearchKey(String),

    #[error("search {key} writes to {path}, which another output already uses")]
    DuplicateOutputPath { key: String, path: String },

    #[error("search {key} has output '{to}' outside the output directory")]
    #[diagnostic(help("use a relative path without '..' components"))]
    OutputOutsideDir { key: String, to: String },

    #[error("forbidden keys in {section}: {keys}")]
    ForbiddenKey { section: String, keys: String },

    #[error("invalid parameter {name} for search {key}: {message}")]
    InvalidParameter {
        key: String,
        name: String,
        message: String,
    },

    #[error("hit table schema mismatch in {path}: {message}")]
    SchemaMismatch { path: String, message: String },

    #[error("failed to parse table {path} at line {line}: {message}")]
    TableParse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    #[error("{provider} request failed: {message}")]
    ProviderHttp { provider: String, message: String },

    #[error("{provider} returned status {status}: {message}")]
    ProviderStatus {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("unexpected {provider} response: {message}")]
    ProviderPayload { provider: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl KiraError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, KiraError::CompoundNotFound(_))
    }

    pub(crate) fn http(provider: &str, err: impl std::fmt::Display) -> Self {
        KiraError::ProviderHttp {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn payload(provider: &str, message: impl Into<String>) -> Self {
        KiraError::ProviderPayload {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}
