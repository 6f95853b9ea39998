use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("dataset type dependency cycle through: {}", .path.join(" -> "))]
    #[diagnostic(code(catalog::cycle))]
    Cycle { path: Vec<String> },

    #[error("dataset type {dataset_type} depends on unknown type {dependency}")]
    #[diagnostic(code(catalog::unknown_dependency))]
    UnknownDependency {
        dataset_type: String,
        dependency: String,
    },

    #[error("illegal status transition for dataset {dataset}: {from} -> {to}")]
    #[diagnostic(code(catalog::illegal_transition))]
    IllegalTransition {
        dataset: String,
        from: String,
        to: String,
    },

    #[error("dependencies of dataset {dataset} are not satisfied: {}", .blocking.join(", "))]
    #[diagnostic(
        code(catalog::dependencies_not_satisfied),
        help("every blocking type needs a dataset in Processed or Released for this genome")
    )]
    DependenciesNotSatisfied {
        dataset: String,
        blocking: Vec<String>,
    },

    #[error("release {0} is already current")]
    #[diagnostic(code(catalog::already_current))]
    AlreadyCurrent(String),

    #[error("concurrent update on {operation} gave up after {attempts} attempts")]
    #[diagnostic(code(catalog::concurrent_update))]
    ConcurrentUpdate { operation: String, attempts: u32 },

    #[error("{entity} not found: {key}")]
    #[diagnostic(code(catalog::not_found))]
    NotFound { entity: &'static str, key: String },

    #[error("integrity violation on {constraint}: {message}")]
    #[diagnostic(code(catalog::integrity_violation))]
    IntegrityViolation { constraint: String, message: String },

    #[error("release site {release_site} does not match genome {genome} publishing site {genome_site}")]
    #[diagnostic(code(catalog::site_mismatch))]
    SiteMismatch {
        genome: String,
        genome_site: String,
        release_site: String,
    },

    #[error("release {release} is not ready: {}", .reasons.join("; "))]
    #[diagnostic(code(catalog::release_not_ready))]
    ReleaseNotReady {
        release: String,
        reasons: Vec<String>,
    },

    #[error("illegal release status change for {release}: {from} -> {to}")]
    #[diagnostic(code(catalog::illegal_release_transition))]
    IllegalReleaseTransition {
        release: String,
        from: String,
        to: String,
    },

    #[error("invalid release version: {0}")]
    InvalidReleaseVersion(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    #[error("invalid assembly accession: {0}")]
    InvalidAccession(String),

    #[error("missing config file at {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read seed document: {0}")]
    SeedParse(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("storage busy: {0}")]
    Busy(String),
}

impl CatalogError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        CatalogError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::Cycle { .. } => "CycleError",
            CatalogError::UnknownDependency { .. } => "UnknownDependencyError",
            CatalogError::IllegalTransition { .. } => "IllegalTransitionError",
            CatalogError::DependenciesNotSatisfied { .. } => "DependenciesNotSatisfiedError",
            CatalogError::AlreadyCurrent(_) => "AlreadyCurrentError",
            CatalogError::ConcurrentUpdate { .. } => "ConcurrentUpdateError",
            CatalogError::NotFound { .. } => "NotFoundError",
            CatalogError::IntegrityViolation { .. } => "IntegrityViolationError",
            CatalogError::SiteMismatch { .. } => "SiteMismatchError",
            CatalogError::ReleaseNotReady { .. } => "ReleaseNotReadyError",
            CatalogError::IllegalReleaseTransition { .. } => "IllegalReleaseTransitionError",
            CatalogError::InvalidReleaseVersion(_)
            | CatalogError::InvalidStatus(_)
            | CatalogError::InvalidValue { .. }
            | CatalogError::InvalidUuid(_)
            | CatalogError::InvalidAccession(_) => "InvalidArgumentError",
            CatalogError::MissingConfig(_)
            | CatalogError::ConfigRead(_)
            | CatalogError::ConfigParse(_)
            | CatalogError::SeedParse(_) => "ConfigError",
            CatalogError::Storage(_) => "StorageError",
            CatalogError::Busy(_) => "StorageBusyError",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CatalogError::Cycle { .. }
                | CatalogError::UnknownDependency { .. }
                | CatalogError::IllegalTransition { .. }
                | CatalogError::DependenciesNotSatisfied { .. }
                | CatalogError::AlreadyCurrent(_)
                | CatalogError::SiteMismatch { .. }
                | CatalogError::ReleaseNotReady { .. }
                | CatalogError::IllegalReleaseTransition { .. }
                | CatalogError::InvalidReleaseVersion(_)
                | CatalogError::InvalidStatus(_)
                | CatalogError::InvalidValue { .. }
                | CatalogError::InvalidUuid(_)
                | CatalogError::InvalidAccession(_)
        )
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let message = message.clone().unwrap_or_else(|| err.to_string());
                CatalogError::IntegrityViolation {
                    constraint: constraint_name(&message),
                    message,
                }
            }
            rusqlite::Error::SqliteFailure(code, _)
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                CatalogError::Busy(err.to_string())
            }
            _ => CatalogError::Storage(err.to_string()),
        }
    }
}

fn constraint_name(message: &str) -> String {
    match message.split_once("constraint failed:") {
        Some((kind, columns)) => format!("{} {}", kind.trim(), columns.trim()),
        None => message.to_string(),
    }
}
