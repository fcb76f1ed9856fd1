//! Remote package sources.
//!
//! A [`Repository`] publishes a YAML package index and serves the zip archive
//! behind each entry. Two backends are provided: [`HttpRepository`] for
//! indices served over HTTP(S), and [`FilesystemRepository`] for the same
//! layout on local disk.

mod filesystem;
mod http;

pub use filesystem::{DEFAULT_INDEX_FILE, FilesystemRepository};
pub use http::HttpRepository;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::models::RemotePackage;

/// Byte stream of a package's zip archive.
pub type PackageArchive = Box<dyn AsyncRead + Send + Unpin>;

/// Read-only source of packages.
#[async_trait]
pub trait Repository: Send + Sync {
    /// List every package in this repository's index.
    async fn list(&self) -> Result<Vec<RemotePackage>>;

    /// Open the archive for `pkg`, resolving its path against this repository.
    async fn get_package_archive(&self, pkg: &RemotePackage) -> Result<PackageArchive>;

    /// Identifying location of this repository (list URL or root directory).
    fn path(&self) -> &str;
}
