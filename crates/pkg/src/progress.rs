//! Per-package notifications for batch operations.

use std::fmt;

use crate::error::PackageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Uninstall,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Install => write!(f, "install"),
            Operation::Uninstall => write!(f, "uninstall"),
        }
    }
}

/// Receives progress from [`PackageManager::install_all`] and
/// [`PackageManager::uninstall_all`]. All methods default to doing nothing.
///
/// [`PackageManager::install_all`]: crate::PackageManager::install_all
/// [`PackageManager::uninstall_all`]: crate::PackageManager::uninstall_all
pub trait ProgressReporter: Send + Sync {
    fn on_start(&self, _id: &str, _operation: Operation) {}

    fn on_success(&self, _id: &str, _operation: Operation) {}

    fn on_failure(&self, _id: &str, _operation: Operation, _error: &PackageError) {}
}

/// Reporter that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {}
