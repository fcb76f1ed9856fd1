//! Manager configuration and repository construction.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{DEFAULT_CACHE_TTL, IndexCache};
use crate::error::{PackageError, Result};
use crate::local::DEFAULT_MANIFEST_FILE;
use crate::repository::{DEFAULT_INDEX_FILE, FilesystemRepository, HttpRepository, Repository};
use crate::utils::{resolve_relative_path, resolve_sibling_path};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings for a [`PackageManager`](crate::PackageManager).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Directory packages are installed into.
    pub install_dir: PathBuf,

    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    /// Timeout applied to every HTTP request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How long a fetched HTTP index is reused.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default)]
    pub sources: Vec<PackageSource>,
}

fn default_manifest_file() -> String {
    DEFAULT_MANIFEST_FILE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

fn default_index_file() -> String {
    DEFAULT_INDEX_FILE.to_string()
}

fn default_enabled() -> bool {
    true
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from("packages"),
            manifest_file: default_manifest_file(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_ttl_secs: default_cache_ttl_secs(),
            sources: Vec::new(),
        }
    }
}

/// A named repository entry.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PackageSource {
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Subdirectory of `install_dir` this source installs into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,

    #[serde(flatten)]
    pub kind: SourceKind,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceKind {
    Http {
        url: String,
    },
    Local {
        path: PathBuf,
        #[serde(default = "default_index_file")]
        index_file: String,
    },
}

impl PackageSource {
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            local_path: None,
            kind: SourceKind::Http { url: url.into() },
        }
    }

    pub fn local(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            local_path: None,
            kind: SourceKind::Local {
                path: path.into(),
                index_file: default_index_file(),
            },
        }
    }

    pub fn with_local_path(mut self, local_path: impl Into<String>) -> Self {
        self.local_path = Some(local_path.into());
        self
    }

    /// URL or directory this source points at.
    pub fn location(&self) -> String {
        match &self.kind {
            SourceKind::Http { url } => url.clone(),
            SourceKind::Local { path, .. } => path.display().to_string(),
        }
    }
}

impl ManagerConfig {
    /// Read configuration from a YAML file.
    ///
    /// Relative `install_dir` and local source paths are resolved against the
    /// directory containing the file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());

        let content = tokio::fs::read(path)
            .await
            .map_err(|e| PackageError::io("read configuration", path, e))?;
        let mut config: ManagerConfig =
            serde_yaml::from_slice(&content).map_err(|source| PackageError::Format {
                location: path.display().to_string(),
                source,
            })?;

        config.install_dir = resolve_sibling_path(path, &config.install_dir)?;
        for source in &mut config.sources {
            if let SourceKind::Local { path: dir, .. } = &mut source.kind {
                *dir = resolve_sibling_path(path, &*dir)?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.install_dir.as_os_str().is_empty() {
            return Err(PackageError::Config("install_dir cannot be empty".to_string()));
        }
        if self.manifest_file.is_empty() {
            return Err(PackageError::Config("manifest_file cannot be empty".to_string()));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.is_empty() {
                return Err(PackageError::Config("source name cannot be empty".to_string()));
            }
            if !names.insert(source.name.as_str()) {
                return Err(PackageError::Config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            if let Some(local_path) = &source.local_path {
                resolve_relative_path(&self.install_dir, local_path).map_err(|e| {
                    PackageError::Config(format!("source '{}': {}", source.name, e))
                })?;
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &PackageSource> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// Build the repository described by `source`.
///
/// HTTP sources share `client` and cache their index in `cache` for `ttl`.
pub fn create_repository(
    source: &PackageSource,
    client: &reqwest::Client,
    cache: &Arc<IndexCache>,
    ttl: Duration,
) -> Result<Arc<dyn Repository>> {
    let repository: Arc<dyn Repository> = match &source.kind {
        SourceKind::Http { url } => Arc::new(
            HttpRepository::new(url, client.clone())?.with_cache(Arc::clone(cache), ttl),
        ),
        SourceKind::Local { path, index_file } => {
            Arc::new(FilesystemRepository::new(path).with_index_file(index_file))
        }
    };

    Ok(repository)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
install_dir: ./plugins
timeout_secs: 30
sources:
  - name: community
    type: http
    url: https://example.com/stable/index.yml
  - name: bundled
    type: local
    path: ./bundled
    local_path: bundled
    enabled: false
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config: ManagerConfig = serde_yaml::from_str(CONFIG).unwrap();

        assert_eq!(config.manifest_file, "manifest");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.cache_ttl(), DEFAULT_CACHE_TTL);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(
            config.sources[0],
            PackageSource::http("community", "https://example.com/stable/index.yml")
        );
        assert!(!config.sources[1].enabled);
        assert_eq!(config.sources[0].local_path, None);
        assert_eq!(config.sources[1].local_path.as_deref(), Some("bundled"));
        assert_eq!(
            config.sources[1].kind,
            SourceKind::Local {
                path: PathBuf::from("./bundled"),
                index_file: "index.yml".to_string(),
            }
        );

        let enabled: Vec<_> = config.enabled_sources().map(|s| s.name.as_str()).collect();
        assert_eq!(enabled, vec!["community"]);
    }

    #[tokio::test]
    async fn test_load_resolves_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("parcel.yml");
        std::fs::write(&config_path, CONFIG).unwrap();

        let config = ManagerConfig::load(&config_path).await.unwrap();

        assert_eq!(config.install_dir, temp_dir.path().join("./plugins"));
        match &config.sources[1].kind {
            SourceKind::Local { path, .. } => assert_eq!(path, &temp_dir.path().join("./bundled")),
            other => panic!("unexpected source kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ManagerConfig::load(temp_dir.path().join("missing.yml")).await.unwrap_err();
        assert!(err.is_transport_error());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let config = ManagerConfig {
            sources: vec![
                PackageSource::http("dup", "https://a.example/index.yml"),
                PackageSource::local("dup", "/srv/repo"),
            ],
            ..ManagerConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate source name 'dup'"));
    }

    #[test]
    fn test_validate_rejects_escaping_local_path() {
        let config = ManagerConfig {
            sources: vec![PackageSource::http("web", "https://a.example/index.yml").with_local_path("../outside")],
            ..ManagerConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source 'web'"));
    }

    #[test]
    fn test_validate_rejects_empty_install_dir() {
        let config = ManagerConfig {
            install_dir: PathBuf::new(),
            ..ManagerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_create_repository() {
        let client = reqwest::Client::new();
        let cache = Arc::new(IndexCache::new());

        let http = create_repository(
            &PackageSource::http("web", "https://example.com/index.yml"),
            &client,
            &cache,
            DEFAULT_CACHE_TTL,
        )
        .unwrap();
        assert_eq!(http.path(), "https://example.com/index.yml");

        let local = create_repository(
            &PackageSource::local("disk", "/srv/repo"),
            &client,
            &cache,
            DEFAULT_CACHE_TTL,
        )
        .unwrap();
        assert_eq!(local.path(), "/srv/repo");

        let bad = create_repository(&PackageSource::http("bad", "not a url"), &client, &cache, DEFAULT_CACHE_TTL);
        assert!(matches!(bad.err(), Some(PackageError::InvalidUrl { .. })));
    }
}
