use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("request to '{url}' failed: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error("request to '{url}' returned {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("IO operation '{operation}' failed on path '{path}': {source}")]
    Io {
        operation: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid package data in '{location}': {source}")]
    Format {
        location: String,
        source: serde_yaml::Error,
    },

    #[error("invalid archive for package '{id}': {source}")]
    Archive {
        id: String,
        source: zip::result::ZipError,
    },

    #[error("archive for package '{id}' contains an unsafe entry '{entry}'")]
    InvalidArchiveEntry { id: String, entry: String },

    #[error("package data does not match expected SHA256 for '{id}' (expected {expected}, got {actual})")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("package '{0}' does not exist")]
    NotInstalled(String),

    #[error("package '{0}' has no source repository")]
    MissingRepository(String),

    #[error("no source named '{0}'")]
    UnknownSource(String),

    #[error("invalid package id '{id}': {reason}")]
    InvalidPackageId { id: String, reason: String },

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<PackageError>,
    },
}

pub type Result<T> = std::result::Result<T, PackageError>;

impl PackageError {
    /// Build an [`PackageError::Io`] for the given operation and path.
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackageError::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Wrap this error with one line of operation context.
    pub fn context(self, context: impl Into<String>) -> Self {
        PackageError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through any context wrappers.
    pub fn root(&self) -> &PackageError {
        match self {
            PackageError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the operation targeted a package that is not installed.
    pub fn is_not_installed(&self) -> bool {
        matches!(self.root(), PackageError::NotInstalled(_))
    }

    pub fn is_integrity_error(&self) -> bool {
        matches!(self.root(), PackageError::ChecksumMismatch { .. })
    }

    /// True for failures reaching a repository or the local disk.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self.root(),
            PackageError::Http { .. } | PackageError::HttpStatus { .. } | PackageError::Io { .. }
        )
    }

    pub fn is_format_error(&self) -> bool {
        matches!(
            self.root(),
            PackageError::Format { .. }
                | PackageError::Archive { .. }
                | PackageError::InvalidArchiveEntry { .. }
        )
    }
}

/// Extension for attaching context to results, mirroring [`PackageError::context`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}
