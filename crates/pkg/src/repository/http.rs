use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use tokio_util::io::StreamReader;
use tracing::{debug, info};
use url::Url;

use super::{PackageArchive, Repository};
use crate::cache::IndexCache;
use crate::error::{PackageError, Result};
use crate::models::{RemotePackage, parse_package_list};
use crate::utils::resolve_package_url;

/// Repository serving its index and archives over HTTP(S).
///
/// Package paths in the index are resolved relative to the index URL.
#[derive(Debug, Clone)]
pub struct HttpRepository {
    list_url: Url,
    client: Client,
    cache: Option<(Arc<IndexCache>, Duration)>,
}

impl HttpRepository {
    pub fn new(list_url: &str, client: Client) -> Result<Self> {
        let list_url = Url::parse(list_url).map_err(|source| PackageError::InvalidUrl {
            url: list_url.to_string(),
            source,
        })?;

        Ok(Self {
            list_url,
            client,
            cache: None,
        })
    }

    /// Serve `list` from `cache` while the stored entry is younger than `ttl`.
    pub fn with_cache(mut self, cache: Arc<IndexCache>, ttl: Duration) -> Self {
        self.cache = Some((cache, ttl));
        self
    }

    pub fn list_url(&self) -> &Url {
        &self.list_url
    }

    /// Fetch the index, ignoring any cached copy, and store the result.
    pub async fn refresh(&self) -> Result<Vec<RemotePackage>> {
        let packages = self.fetch_list().await?;
        if let Some((cache, _)) = &self.cache {
            cache.cache_list(self.list_url.as_str(), packages.clone());
        }
        Ok(packages)
    }

    async fn fetch_list(&self) -> Result<Vec<RemotePackage>> {
        info!("Fetching package index from {}", self.list_url);
        let response = self.get(&self.list_url).await?;

        let body = response.bytes().await.map_err(|source| PackageError::Http {
            url: self.list_url.to_string(),
            source,
        })?;

        parse_package_list(&body, self.list_url.as_str())
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| PackageError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PackageError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Repository for HttpRepository {
    async fn list(&self) -> Result<Vec<RemotePackage>> {
        if let Some((cache, ttl)) = &self.cache {
            if let Some(cached) = cache.get_cached_list(self.list_url.as_str()) {
                if cached.is_fresh(*ttl) {
                    debug!("Using cached package index for {}", self.list_url);
                    return Ok(cached.data);
                }
            }
        }

        self.refresh().await
    }

    async fn get_package_archive(&self, pkg: &RemotePackage) -> Result<PackageArchive> {
        let url = resolve_package_url(&self.list_url, &pkg.location.path)?;
        debug!("Downloading '{}' from {}", pkg.id, url);

        let response = self.get(&url).await?;
        let stream = response.bytes_stream().map_err(std::io::Error::other);

        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }

    fn path(&self) -> &str {
        self.list_url.as_str()
    }
}
