use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{PackageArchive, Repository};
use crate::error::{PackageError, Result};
use crate::models::{RemotePackage, parse_package_list};
use crate::utils::resolve_relative_path;

/// Index filename used when a local source does not name one.
pub const DEFAULT_INDEX_FILE: &str = "index.yml";

/// Repository backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FilesystemRepository {
    root: PathBuf,
    root_display: String,
    index_file: String,
}

impl FilesystemRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            root_display: root.display().to_string(),
            root,
            index_file: DEFAULT_INDEX_FILE.to_string(),
        }
    }

    pub fn with_index_file(mut self, index_file: impl Into<String>) -> Self {
        self.index_file = index_file.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(&self.index_file)
    }
}

#[async_trait]
impl Repository for FilesystemRepository {
    async fn list(&self) -> Result<Vec<RemotePackage>> {
        let index_path = self.index_path();
        debug!("Reading package index {}", index_path.display());

        let content = tokio::fs::read(&index_path)
            .await
            .map_err(|e| PackageError::io("read package index", &index_path, e))?;

        parse_package_list(&content, &index_path.display().to_string())
    }

    async fn get_package_archive(&self, pkg: &RemotePackage) -> Result<PackageArchive> {
        let archive_path = resolve_relative_path(&self.root, &pkg.location.path)?;
        debug!("Opening archive {} for '{}'", archive_path.display(), pkg.id);

        let file = tokio::fs::File::open(&archive_path)
            .await
            .map_err(|e| PackageError::io("open package archive", &archive_path, e))?;

        Ok(Box::new(file))
    }

    fn path(&self) -> &str {
        &self.root_display
    }
}
