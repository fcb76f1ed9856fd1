use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{PackageError, Result};

/// Resolves a package path from a repository index against the index URL.
///
/// Follows browser link resolution:
///
/// * a path with a scheme is used as-is
/// * a path starting with `/` replaces the path of `list_url`
/// * anything else is relative to the directory containing `list_url`
///
/// # Examples
///
/// ```
/// use parcel_pkg::utils::resolve_package_url;
/// use url::Url;
///
/// let list = Url::parse("https://example.com/foo/packages.yaml").unwrap();
/// let resolved = resolve_package_url(&list, "bar").unwrap();
/// assert_eq!(resolved.as_str(), "https://example.com/foo/bar");
/// ```
pub fn resolve_package_url(list_url: &Url, path: &str) -> Result<Url> {
    list_url.join(path).map_err(|source| PackageError::InvalidUrl {
        url: path.to_string(),
        source,
    })
}

/// Resolves a sibling path relative to the parent directory of `base_path`.
///
/// Absolute `relative_sibling_path` values are returned unchanged.
pub fn resolve_sibling_path(
    base_path: impl AsRef<Path>,
    relative_sibling_path: impl AsRef<Path>,
) -> Result<PathBuf> {
    fn inner(base_path: &Path, relative_sibling_path: &Path) -> Result<PathBuf> {
        let base_dir = base_path.parent().ok_or_else(|| {
            PackageError::InvalidPath(format!("No parent directory for {}", base_path.display()))
        })?;

        Ok(base_dir.join(relative_sibling_path))
    }
    inner(base_path.as_ref(), relative_sibling_path.as_ref())
}

/// Joins a repository-relative `path` onto `root`, refusing paths that leave it.
pub fn resolve_relative_path(root: impl AsRef<Path>, path: &str) -> Result<PathBuf> {
    fn inner(root: &Path, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });

        if path.is_empty() || escapes {
            return Err(PackageError::InvalidPath(format!(
                "'{}' is not a relative path inside {}",
                path,
                root.display()
            )));
        }

        Ok(root.join(relative))
    }
    inner(root.as_ref(), path)
}
