//! Package manager: one local store plus any number of repositories.
//!
//! Operations on the same package id are not serialized here. Callers that
//! run installs or uninstalls concurrently must avoid touching one id from
//! two tasks at once.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use zip::ZipArchive;

use crate::cache::IndexCache;
use crate::config::{ManagerConfig, create_repository};
use crate::error::{PackageError, Result, ResultExt};
use crate::index::{LocalPackageIndex, PackageStatus, PackageStatusIndex, RemotePackageIndex};
use crate::local::LocalStore;
use crate::models::{Manifest, RemotePackage};
use crate::progress::{Operation, ProgressReporter};
use crate::repository::Repository;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Outcome of a batch install or uninstall.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, PackageError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// A repository registered with the manager under a name.
struct Source {
    name: String,
    local_path: Option<String>,
    repository: Arc<dyn Repository>,
}

pub struct PackageManager {
    local: LocalStore,
    repositories: Vec<Arc<dyn Repository>>,
    sources: Vec<Source>,
}

impl PackageManager {
    pub fn new(local: LocalStore) -> Self {
        Self {
            local,
            repositories: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_repositories(mut self, repositories: Vec<Arc<dyn Repository>>) -> Self {
        for repository in repositories {
            self.add_repository(repository);
        }
        self
    }

    /// Build a manager from configuration.
    ///
    /// All HTTP sources share one client and one index cache.
    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PackageError::Config(format!("failed to build HTTP client: {e}")))?;
        let cache = Arc::new(IndexCache::new());

        let local = LocalStore::new(&config.install_dir).with_manifest_file(&config.manifest_file);
        let mut manager = Self::new(local);
        for source in config.enabled_sources() {
            let repository = create_repository(source, &client, &cache, config.cache_ttl())
                .with_context(|| format!("configuring source '{}'", source.name))?;
            manager.add_source(&source.name, source.local_path.clone(), repository);
        }

        Ok(manager)
    }

    /// Register `repository` under its own location, installing at the top level.
    pub fn add_repository(&mut self, repository: Arc<dyn Repository>) {
        let name = repository.path().to_string();
        self.add_source(name, None, repository);
    }

    /// Register `repository` as source `name`.
    ///
    /// Packages installed from it go to `local_path` under the store's base
    /// directory when given.
    pub fn add_source(
        &mut self,
        name: impl Into<String>,
        local_path: Option<String>,
        repository: Arc<dyn Repository>,
    ) {
        let name = name.into();
        info!("Registered source '{}' at {}", name, repository.path());

        if let Some(dir) = &local_path {
            self.local.add_source_dir(dir.clone());
        }
        self.repositories.push(Arc::clone(&repository));
        self.sources.push(Source {
            name,
            local_path,
            repository,
        });
    }

    pub fn repositories(&self) -> &[Arc<dyn Repository>] {
        &self.repositories
    }

    /// Names of the registered sources, in registration order.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name.as_str())
    }

    /// Look a source up by name, falling back to its repository location.
    fn source(&self, name: &str) -> Option<&Source> {
        self.sources
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.sources.iter().find(|s| s.repository.path() == name))
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub async fn list_installed(&self) -> Result<LocalPackageIndex> {
        self.local.list().await.context("listing local packages")
    }

    /// Merge the package lists of every repository, in registration order.
    ///
    /// Fails if any repository fails.
    pub async fn list_remote(&self) -> Result<RemotePackageIndex> {
        let mut index = RemotePackageIndex::new();

        for repository in &self.repositories {
            let packages = repository
                .list()
                .await
                .with_context(|| format!("listing packages from {}", repository.path()))?;

            index.merge_all(
                packages
                    .into_iter()
                    .map(|pkg| pkg.with_repository(Arc::clone(repository))),
            );
        }

        Ok(index)
    }

    /// Packages offered by one source, tagged with its repository.
    ///
    /// Unlike [`list_remote`](Self::list_remote) nothing is merged, so a
    /// package can be installed from this source even when another offers a
    /// newer date.
    pub async fn list_source(&self, name: &str) -> Result<Vec<RemotePackage>> {
        let source = self
            .source(name)
            .ok_or_else(|| PackageError::UnknownSource(name.to_string()))?;

        let packages = source
            .repository
            .list()
            .await
            .with_context(|| format!("listing packages from {}", source.repository.path()))?;

        Ok(packages
            .into_iter()
            .map(|pkg| pkg.with_repository(Arc::clone(&source.repository)))
            .collect())
    }

    /// Status of every installed package.
    pub async fn installed_status(&self) -> Result<PackageStatusIndex> {
        let local = self.list_installed().await?;
        let remote = self.list_remote().await?;

        let mut statuses = PackageStatusIndex::new();
        statuses.populate_local(&local, &remote);
        Ok(statuses)
    }

    /// Status of every installed or available package.
    pub async fn list(&self) -> Result<PackageStatusIndex> {
        let local = self.list_installed().await?;
        let remote = self.list_remote().await?;

        let mut statuses = PackageStatusIndex::new();
        statuses.populate_local(&local, &remote);
        statuses.populate_remote(&remote);
        Ok(statuses)
    }

    /// Installed packages for which a repository offers a newer date.
    pub async fn upgradable(&self) -> Result<Vec<PackageStatus>> {
        let statuses = self.installed_status().await?;
        Ok(statuses.upgradable().cloned().collect())
    }

    /// Download, verify and unpack `pkg`, replacing any installed copy.
    ///
    /// The whole archive is held in memory and checked against its SHA-256
    /// before anything is written to the store.
    pub async fn install(&self, pkg: &RemotePackage) -> Result<Manifest> {
        let repository = pkg
            .repository()
            .ok_or_else(|| PackageError::MissingRepository(pkg.id.clone()))?;

        info!("Installing '{}' {} from {}", pkg.id, pkg.version, repository.path());

        let mut archive = repository.get_package_archive(pkg).await?;
        let mut data = Vec::new();
        archive.read_to_end(&mut data).await.map_err(|e| {
            PackageError::io("read package archive", PathBuf::from(repository.path()), e)
        })?;

        verify_checksum(&pkg.id, &data, &pkg.location.sha256)?;

        let zip = ZipArchive::new(Cursor::new(data)).map_err(|source| PackageError::Archive {
            id: pkg.id.clone(),
            source,
        })?;

        let local_path = self
            .sources
            .iter()
            .find(|s| std::ptr::addr_eq(Arc::as_ptr(&s.repository), Arc::as_ptr(repository)))
            .and_then(|s| s.local_path.as_deref());

        self.local.install_package_into(pkg, zip, local_path).await
    }

    pub async fn uninstall(&self, id: &str) -> Result<()> {
        info!("Uninstalling '{}'", id);
        self.local.delete_package(id).await
    }

    /// Install each package in turn. A failure is recorded and the batch continues.
    pub async fn install_all(
        &self,
        packages: &[RemotePackage],
        reporter: &dyn ProgressReporter,
    ) -> BatchReport {
        info!("Starting batch install of {} packages", packages.len());
        let mut report = BatchReport::default();

        for pkg in packages {
            reporter.on_start(&pkg.id, Operation::Install);
            match self.install(pkg).await {
                Ok(_) => {
                    reporter.on_success(&pkg.id, Operation::Install);
                    report.succeeded.push(pkg.id.clone());
                }
                Err(e) => {
                    error!("Failed to install {}: {}", pkg.id, e);
                    reporter.on_failure(&pkg.id, Operation::Install, &e);
                    report.failed.push((pkg.id.clone(), e));
                }
            }
        }

        info!(
            "Batch install completed: {} successful, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    /// Uninstall each id in turn. A failure is recorded and the batch continues.
    pub async fn uninstall_all(&self, ids: &[String], reporter: &dyn ProgressReporter) -> BatchReport {
        info!("Starting batch uninstall of {} packages", ids.len());
        let mut report = BatchReport::default();

        for id in ids {
            reporter.on_start(id, Operation::Uninstall);
            match self.uninstall(id).await {
                Ok(()) => {
                    reporter.on_success(id, Operation::Uninstall);
                    report.succeeded.push(id.clone());
                }
                Err(e) => {
                    error!("Failed to uninstall {}: {}", id, e);
                    reporter.on_failure(id, Operation::Uninstall, &e);
                    report.failed.push((id.clone(), e));
                }
            }
        }

        info!(
            "Batch uninstall completed: {} successful, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }
}

fn verify_checksum(id: &str, data: &[u8], expected: &str) -> Result<()> {
    let actual = format!("{:x}", Sha256::digest(data));
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(PackageError::ChecksumMismatch {
            id: id.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
