//! On-disk store of installed packages.
//!
//! Each package lives in `<base_dir>/<id>/` alongside a YAML manifest. Sources
//! may install into their own subdirectory, `<base_dir>/<source_dir>/<id>/`.
//! The manifest doubles as the commit marker for an install: it is written
//! after every file and removed before any file, so a directory without one is
//! never reported as installed.

use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{PackageError, Result};
use crate::index::LocalPackageIndex;
use crate::models::{Manifest, RemotePackage};
use crate::utils::resolve_relative_path;

/// Manifest filename used when none is configured.
pub const DEFAULT_MANIFEST_FILE: &str = "manifest";

#[derive(Debug, Clone)]
pub struct LocalStore {
    base_dir: PathBuf,
    manifest_file: String,
    /// Subdirectories of `base_dir` that sources install into.
    source_dirs: Vec<String>,
}

impl LocalStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            source_dirs: Vec::new(),
        }
    }

    pub fn with_manifest_file(mut self, manifest_file: impl Into<String>) -> Self {
        self.manifest_file = manifest_file.into();
        self
    }

    /// Also look for packages in `dir`, relative to the base directory.
    pub fn with_source_dir(mut self, dir: impl Into<String>) -> Self {
        self.add_source_dir(dir);
        self
    }

    pub fn add_source_dir(&mut self, dir: impl Into<String>) {
        let dir = dir.into();
        if !self.source_dirs.contains(&dir) {
            self.source_dirs.push(dir);
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn manifest_file(&self) -> &str {
        &self.manifest_file
    }

    pub fn source_dirs(&self) -> &[String] {
        &self.source_dirs
    }

    /// Directory holding the files of package `id` when installed at the top level.
    pub fn package_dir(&self, id: &str) -> Result<PathBuf> {
        validate_package_id(id)?;
        Ok(self.base_dir.join(id))
    }

    /// Base directory first, then each source directory in registration order.
    fn roots(&self) -> Result<Vec<PathBuf>> {
        let mut roots = vec![self.base_dir.clone()];
        for dir in &self.source_dirs {
            roots.push(resolve_relative_path(&self.base_dir, dir)?);
        }
        Ok(roots)
    }

    fn install_root(&self, source_dir: Option<&str>) -> Result<PathBuf> {
        match source_dir {
            None => Ok(self.base_dir.clone()),
            Some(dir) if self.source_dirs.iter().any(|d| d == dir) => {
                resolve_relative_path(&self.base_dir, dir)
            }
            Some(dir) => Err(PackageError::InvalidPath(format!(
                "'{}' is not a source directory of {}",
                dir,
                self.base_dir.display()
            ))),
        }
    }

    /// Directory package `id` is currently installed in, if any.
    async fn find_package_dir(&self, id: &str) -> Result<Option<PathBuf>> {
        validate_package_id(id)?;

        for root in self.roots()? {
            let package_dir = root.join(id);
            let manifest_path = package_dir.join(&self.manifest_file);
            let found = fs::try_exists(&manifest_path)
                .await
                .map_err(|e| PackageError::io("check manifest", &manifest_path, e))?;
            if found {
                return Ok(Some(package_dir));
            }
        }

        Ok(None)
    }

    /// Scan the store for installed packages.
    ///
    /// Subdirectories without a manifest are ignored. A missing base directory
    /// is an empty store. An id found under more than one root keeps the
    /// first copy.
    pub async fn list(&self) -> Result<LocalPackageIndex> {
        let mut index = LocalPackageIndex::new();
        for root in self.roots()? {
            self.scan(&root, &mut index).await?;
        }
        Ok(index)
    }

    async fn scan(&self, root: &Path, index: &mut LocalPackageIndex) -> Result<()> {
        let mut entries = match fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store directory {} does not exist", root.display());
                return Ok(());
            }
            Err(e) => return Err(PackageError::io("read store directory", root, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PackageError::io("read store directory", root, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| PackageError::io("inspect store entry", &path, e))?;
            if !file_type.is_dir() {
                continue;
            }

            let manifest_path = path.join(&self.manifest_file);
            let Some(mut manifest) = read_manifest(&manifest_path).await? else {
                debug!("Skipping {}: no manifest", path.display());
                continue;
            };

            let dir_name = entry.file_name().to_string_lossy().into_owned();
            if manifest.id != dir_name {
                warn!(
                    "Manifest in {} declares id '{}', using directory name",
                    path.display(),
                    manifest.id
                );
                manifest.id = dir_name;
            }

            if index.contains_key(&manifest.id) {
                warn!(
                    "Ignoring {}: '{}' is already installed elsewhere",
                    path.display(),
                    manifest.id
                );
                continue;
            }

            index.insert(manifest);
        }

        Ok(())
    }

    /// True if package `id` has a manifest.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.find_package_dir(id).await?.is_some())
    }

    pub async fn get_manifest(&self, id: &str) -> Result<Manifest> {
        let package_dir = self
            .find_package_dir(id)
            .await?
            .ok_or_else(|| PackageError::NotInstalled(id.to_string()))?;

        read_manifest(&package_dir.join(&self.manifest_file))
            .await?
            .ok_or_else(|| PackageError::NotInstalled(id.to_string()))
    }

    /// Unpack `archive` as package `pkg` at the top level, replacing any previous install.
    ///
    /// The archive is expected to have been verified by the caller.
    pub async fn install_package(
        &self,
        pkg: &RemotePackage,
        archive: ZipArchive<Cursor<Vec<u8>>>,
    ) -> Result<Manifest> {
        self.install_package_into(pkg, archive, None).await
    }

    /// Unpack `archive` into `source_dir`, or the top level when `None`.
    ///
    /// Every entry is read and checked before the previous install is touched,
    /// so a bad archive leaves the installed copy as it was.
    pub async fn install_package_into(
        &self,
        pkg: &RemotePackage,
        mut archive: ZipArchive<Cursor<Vec<u8>>>,
        source_dir: Option<&str>,
    ) -> Result<Manifest> {
        validate_package_id(&pkg.id)?;
        let package_dir = self.install_root(source_dir)?.join(&pkg.id);

        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let Some(entry) = read_entry(&mut archive, i, &pkg.id)? else {
                continue;
            };

            if entry.relative == self.manifest_file {
                warn!(
                    "Archive for '{}' ships its own '{}', ignoring it",
                    pkg.id, self.manifest_file
                );
                continue;
            }
            entries.push(entry);
        }

        if self.exists(&pkg.id).await? {
            debug!("Removing previous install of '{}'", pkg.id);
            self.delete_package(&pkg.id).await?;
        }

        fs::create_dir_all(&package_dir)
            .await
            .map_err(|e| PackageError::io("create package directory", &package_dir, e))?;

        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let target = package_dir.join(&entry.relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PackageError::io("create directory", parent, e))?;
            }

            fs::write(&target, &entry.data)
                .await
                .map_err(|e| PackageError::io("write package file", &target, e))?;
            set_mode(&target, entry.mode).await?;

            files.push(entry.relative);
        }

        let manifest = Manifest::from(pkg).with_files(files);
        self.write_manifest(&package_dir, &manifest).await?;

        info!(
            "Installed package '{}' ({} files) into {}",
            manifest.id,
            manifest.files.len(),
            package_dir.display()
        );
        Ok(manifest)
    }

    /// Remove package `id` and the files its manifest records.
    pub async fn delete_package(&self, id: &str) -> Result<()> {
        let package_dir = self
            .find_package_dir(id)
            .await?
            .ok_or_else(|| PackageError::NotInstalled(id.to_string()))?;
        let manifest_path = package_dir.join(&self.manifest_file);
        let manifest = read_manifest(&manifest_path)
            .await?
            .ok_or_else(|| PackageError::NotInstalled(id.to_string()))?;

        fs::remove_file(&manifest_path)
            .await
            .map_err(|e| PackageError::io("remove manifest", &manifest_path, e))?;

        if manifest.files.is_empty() {
            // Manifests without a file list own their whole directory.
            fs::remove_dir_all(&package_dir)
                .await
                .map_err(|e| PackageError::io("remove package directory", &package_dir, e))?;
            info!("Uninstalled package '{}'", id);
            return Ok(());
        }

        let mut dirs = BTreeSet::new();
        for file in &manifest.files {
            let path = package_dir.join(file);
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Recorded file {} already gone", path.display());
                }
                Err(e) => return Err(PackageError::io("remove package file", &path, e)),
            }

            let mut parent = Path::new(file).parent();
            while let Some(dir) = parent.filter(|d| !d.as_os_str().is_empty()) {
                dirs.insert(dir.to_path_buf());
                parent = dir.parent();
            }
        }

        // Deepest directories first.
        let mut dirs: Vec<_> = dirs.into_iter().collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            let _ = fs::remove_dir(package_dir.join(dir)).await;
        }

        if fs::remove_dir(&package_dir).await.is_err() {
            warn!(
                "Left {} in place: it contains files not owned by '{}'",
                package_dir.display(),
                id
            );
        }

        info!("Uninstalled package '{}'", id);
        Ok(())
    }

    async fn write_manifest(&self, package_dir: &Path, manifest: &Manifest) -> Result<()> {
        let manifest_path = package_dir.join(&self.manifest_file);
        let content = serde_yaml::to_string(manifest).map_err(|source| PackageError::Format {
            location: manifest_path.display().to_string(),
            source,
        })?;

        fs::write(&manifest_path, content)
            .await
            .map_err(|e| PackageError::io("write manifest", &manifest_path, e))
    }
}

/// Reject ids that are empty, hidden, too long, or could leave the store directory.
pub fn validate_package_id(id: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(PackageError::InvalidPackageId {
            id: id.to_string(),
            reason: reason.to_string(),
        })
    };

    if id.is_empty() {
        return invalid("id cannot be empty");
    }
    if id.contains("..") || id.contains('/') || id.contains('\\') {
        return invalid("id contains path separators or traversal sequences");
    }
    if id.starts_with('.') || id.contains('\0') {
        return invalid("id starts with a dot or contains null bytes");
    }
    if id.len() > 255 {
        return invalid("id is too long (max 255 characters)");
    }

    Ok(())
}

async fn read_manifest(path: &Path) -> Result<Option<Manifest>> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PackageError::io("read manifest", path, e)),
    };

    serde_yaml::from_slice(&content)
        .map(Some)
        .map_err(|source| PackageError::Format {
            location: path.display().to_string(),
            source,
        })
}

struct ArchiveEntry {
    relative: String,
    data: Vec<u8>,
    mode: Option<u32>,
}

/// Read entry `index` fully. Directories yield `None`.
fn read_entry(
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    index: usize,
    id: &str,
) -> Result<Option<ArchiveEntry>> {
    let archive_error = |source| PackageError::Archive {
        id: id.to_string(),
        source,
    };

    let mut file = archive.by_index(index).map_err(archive_error)?;
    if file.is_dir() {
        return Ok(None);
    }

    let relative = file
        .enclosed_name()
        .and_then(|path| normalize_entry_path(&path))
        .ok_or_else(|| PackageError::InvalidArchiveEntry {
            id: id.to_string(),
            entry: file.name().to_string(),
        })?;

    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| archive_error(zip::result::ZipError::Io(e)))?;

    Ok(Some(ArchiveEntry {
        relative,
        data,
        mode: file.unix_mode(),
    }))
}

fn normalize_entry_path(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode.map(|m| m & 0o777).filter(|m| *m != 0) else {
        return Ok(());
    };

    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| PackageError::io("set file permissions", path, e))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}
