//! Parcel - package discovery and installation for host application plugins
//!
//! This crate tracks self-contained packages (plugins, scrapers, extensions)
//! published by one or more repositories and installed into a local store.
//!
//! # Features
//!
//! - **Multiple Repositories**: HTTP(S) indices and local directory trees
//! - **Verified Installs**: every archive is checked against its SHA-256 before unpacking
//! - **Upgrade Tracking**: installed packages are compared with repositories by release date
//! - **Index Caching**: HTTP indices are reused for a configurable TTL
//! - **Batch Operations**: per-package failure isolation with progress callbacks
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parcel_pkg::{FilesystemRepository, LocalStore, PackageManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = PackageManager::new(LocalStore::new("./plugins"))
//!     .with_repositories(vec![Arc::new(FilesystemRepository::new("./repo"))]);
//!
//! for (id, status) in manager.list().await?.iter() {
//!     if status.upgradable() {
//!         println!("{id} can be upgraded");
//!     }
//! }
//!
//! let remote = manager.list_remote().await?;
//! if let Some(pkg) = remote.get("my-plugin") {
//!     manager.install(pkg).await?;
//! }
//! # Ok(())
//! # }
//! ```
pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod local;
pub mod manager;
pub mod models;
pub mod progress;
pub mod repository;
pub mod utils;

// Re-export commonly used types
pub use cache::{CachedList, DEFAULT_CACHE_TTL, IndexCache};
pub use config::{ManagerConfig, PackageSource, SourceKind, create_repository};
pub use error::{PackageError, Result, ResultExt};
pub use index::{LocalPackageIndex, PackageStatus, PackageStatusIndex, RemotePackageIndex};
pub use local::LocalStore;
pub use manager::{BatchReport, PackageManager};
pub use models::{Manifest, PackageLocation, PackageMetadata, PackageVersion, RemotePackage};
pub use progress::{NoopReporter, Operation, ProgressReporter};
pub use repository::{FilesystemRepository, HttpRepository, PackageArchive, Repository};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "parcel_pkg");
    }
}
