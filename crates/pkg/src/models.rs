//! Package value types shared by repositories, the local store and the manager.
//!
//! These types mirror the YAML formats published by repositories (the package
//! index) and written by the local store (the manifest). None of them perform
//! I/O.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{PackageError, Result};
use crate::repository::Repository;

/// Layout used for package dates in index and manifest files.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Parse a date written in [`DATE_FORMAT`].
pub fn parse_package_date(value: &str) -> std::result::Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_str(value.trim(), DATE_FORMAT)
}

/// Version label and release date of a package.
///
/// `date` decides freshness. `version` is only ever displayed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageVersion {
    #[serde(default)]
    pub version: String,

    #[serde(
        default,
        with = "package_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<DateTime<FixedOffset>>,
}

impl PackageVersion {
    pub fn new(version: impl Into<String>, date: Option<DateTime<FixedOffset>>) -> Self {
        Self {
            version: version.into(),
            date,
        }
    }

    /// True if `self` was released strictly after `other`.
    ///
    /// A missing date is older than any present date.
    pub fn is_newer_than(&self, other: &PackageVersion) -> bool {
        self.date > other.date
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.date.map(|d| d.format("%Y-%m-%d").to_string());
        match (self.version.is_empty(), date) {
            (false, Some(date)) => write!(f, "{} ({})", self.version, date),
            (true, Some(date)) => write!(f, "{}", date),
            _ => write!(f, "{}", self.version),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    #[serde(default)]
    pub description: String,
}

/// Where a package archive lives inside its repository, and its expected digest.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageLocation {
    pub path: String,
    pub sha256: String,
}

/// A package as advertised by a repository index.
#[derive(Serialize, Deserialize, Clone)]
#[serde(from = "RemotePackageRecord")]
pub struct RemotePackage {
    pub id: String,
    pub name: String,

    #[serde(flatten)]
    pub metadata: PackageMetadata,

    #[serde(flatten)]
    pub version: PackageVersion,

    #[serde(flatten)]
    pub location: PackageLocation,

    /// Repository the package was listed by; attached by the manager.
    #[serde(skip)]
    pub repository: Option<Arc<dyn Repository>>,
}

impl RemotePackage {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            metadata: PackageMetadata::default(),
            version: PackageVersion::default(),
            location: PackageLocation::default(),
            repository: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    pub fn with_version(mut self, version: PackageVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_location(mut self, path: impl Into<String>, sha256: impl Into<String>) -> Self {
        self.location = PackageLocation {
            path: path.into(),
            sha256: sha256.into(),
        };
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn repository(&self) -> Option<&Arc<dyn Repository>> {
        self.repository.as_ref()
    }
}

impl PartialEq for RemotePackage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.metadata == other.metadata
            && self.version == other.version
            && self.location == other.location
    }
}

impl fmt::Debug for RemotePackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotePackage")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("version", &self.version)
            .field("location", &self.location)
            .field("repository", &self.repository.as_ref().map(|r| r.path().to_string()))
            .finish()
    }
}

/// Record of an installed package, written next to its files.
///
/// Provenance (archive path and digest) is deliberately not kept.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(from = "ManifestRecord")]
pub struct Manifest {
    pub id: String,
    pub name: String,

    #[serde(flatten)]
    pub metadata: PackageMetadata,

    #[serde(flatten)]
    pub version: PackageVersion,

    /// Package-relative paths of the files written on install.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl Manifest {
    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }
}

impl From<&RemotePackage> for Manifest {
    fn from(pkg: &RemotePackage) -> Self {
        Self {
            id: pkg.id.clone(),
            name: pkg.name.clone(),
            metadata: pkg.metadata.clone(),
            version: pkg.version.clone(),
            files: Vec::new(),
        }
    }
}

// Flat on-disk shapes. Reading through `flatten` buffers values by their YAML
// type, so an unquoted `version: 1.0` would fail to become a string.

#[derive(Deserialize)]
struct RemotePackageRecord {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, with = "package_date")]
    date: Option<DateTime<FixedOffset>>,
    path: String,
    sha256: String,
}

impl From<RemotePackageRecord> for RemotePackage {
    fn from(record: RemotePackageRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            metadata: PackageMetadata {
                description: record.description.unwrap_or_default(),
            },
            version: PackageVersion::new(record.version.unwrap_or_default(), record.date),
            location: PackageLocation {
                path: record.path,
                sha256: record.sha256,
            },
            repository: None,
        }
    }
}

#[derive(Deserialize)]
struct ManifestRecord {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, with = "package_date")]
    date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    files: Vec<String>,
}

impl From<ManifestRecord> for Manifest {
    fn from(record: ManifestRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            metadata: PackageMetadata {
                description: record.description.unwrap_or_default(),
            },
            version: PackageVersion::new(record.version.unwrap_or_default(), record.date),
            files: record.files,
        }
    }
}

/// Parse a repository package index.
///
/// `location` names the URL or file the content came from and is used in errors.
pub fn parse_package_list(content: &[u8], location: &str) -> Result<Vec<RemotePackage>> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    serde_yaml::from_slice(content).map_err(|source| PackageError::Format {
        location: location.to_string(),
        source,
    })
}

mod package_date {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{DATE_FORMAT, parse_package_date};

    pub fn serialize<S>(date: &Option<DateTime<FixedOffset>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&date.format(DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(value) if !value.trim().is_empty() => parse_package_date(&value)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
- id: my-plugin
  name: My Plugin
  description: Does a thing
  version: "1.2.0"
  date: "2024-03-01 12:00:00 +0000"
  path: packages/my-plugin.zip
  sha256: 0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef
- id: bare
  name: Bare
  path: bare.zip
  sha256: ff
"#;

    #[test]
    fn test_parse_package_list() {
        let packages = parse_package_list(INDEX.as_bytes(), "index.yml").unwrap();
        assert_eq!(packages.len(), 2);

        let pkg = &packages[0];
        assert_eq!(pkg.id, "my-plugin");
        assert_eq!(pkg.name, "My Plugin");
        assert_eq!(pkg.metadata.description, "Does a thing");
        assert_eq!(pkg.version.version, "1.2.0");
        assert_eq!(
            pkg.version.date,
            Some(parse_package_date("2024-03-01 12:00:00 +0000").unwrap())
        );
        assert_eq!(pkg.location.path, "packages/my-plugin.zip");
        assert!(pkg.repository.is_none());

        let bare = &packages[1];
        assert_eq!(bare.version, PackageVersion::default());
        assert!(bare.metadata.description.is_empty());
    }

    #[test]
    fn test_parse_unquoted_scalars_as_text() {
        let content = "\
- id: 123
  name: 2024
  version: 1.0
  path: a.zip
  sha256: ab
- id: b
  name: B
  description: ~
  version: 1234567
  path: b.zip
  sha256: cd
";
        let packages = parse_package_list(content.as_bytes(), "index.yml").unwrap();

        assert_eq!(packages[0].id, "123");
        assert_eq!(packages[0].name, "2024");
        assert_eq!(packages[0].version.version, "1.0");
        assert_eq!(packages[1].version.version, "1234567");
        assert!(packages[1].metadata.description.is_empty());
    }

    #[test]
    fn test_manifest_with_unquoted_version() {
        let content = "id: foo\nname: Foo\nversion: 2\ndate: \"2024-03-01 12:00:00 +0000\"\nfiles:\n  - a.txt\n";
        let manifest: Manifest = serde_yaml::from_str(content).unwrap();

        assert_eq!(manifest.version.version, "2");
        assert!(manifest.version.date.is_some());
        assert_eq!(manifest.files, vec!["a.txt"]);
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_package_list(b"  \n", "empty.yml").unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_list_reports_location() {
        let err = parse_package_list(b"- id: [unclosed", "https://example.com/index.yml").unwrap_err();
        assert!(err.is_format_error());
        assert!(err.to_string().contains("https://example.com/index.yml"));
    }

    #[test]
    fn test_parse_rejects_bad_date() {
        let content = "- id: a\n  name: A\n  date: \"yesterday\"\n  path: a.zip\n  sha256: aa\n";
        assert!(parse_package_list(content.as_bytes(), "index.yml").is_err());
    }

    #[test]
    fn test_remote_package_round_trip() {
        let listed = parse_package_list(INDEX.as_bytes(), "index.yml").unwrap();
        let yaml = serde_yaml::to_string(&listed).unwrap();
        let parsed = parse_package_list(yaml.as_bytes(), "round-trip").unwrap();

        assert_eq!(listed, parsed);
        assert!(yaml.contains("2024-03-01 12:00:00 +0000"));
    }

    #[test]
    fn test_date_keeps_offset() {
        let date = parse_package_date("2024-03-01 12:00:00 +0530").unwrap();
        assert_eq!(date.format(DATE_FORMAT).to_string(), "2024-03-01 12:00:00 +0530");
    }

    #[test]
    fn test_manifest_strips_location() {
        let pkg = RemotePackage::new("my-plugin", "My Plugin")
            .with_description("Does a thing")
            .with_location("packages/my-plugin.zip", "abcd");
        let manifest = Manifest::from(&pkg);

        let yaml = serde_yaml::to_string(&manifest).unwrap();
        assert!(!yaml.contains("path"));
        assert!(!yaml.contains("sha256"));
        assert!(!yaml.contains("files"));
        assert!(yaml.contains("description: Does a thing"));
    }

    #[test]
    fn test_version_display() {
        let date = parse_package_date("2024-03-01 12:00:00 +0000").unwrap();

        assert_eq!(PackageVersion::new("1.2.0", Some(date)).to_string(), "1.2.0 (2024-03-01)");
        assert_eq!(PackageVersion::new("", Some(date)).to_string(), "2024-03-01");
        assert_eq!(PackageVersion::new("1.2.0", None).to_string(), "1.2.0");
    }

    #[test]
    fn test_is_newer_than() {
        let older = PackageVersion::new("1", Some(parse_package_date("2024-01-01 00:00:00 +0000").unwrap()));
        let newer = PackageVersion::new("2", Some(parse_package_date("2024-01-01 01:00:00 +0000").unwrap()));
        let undated = PackageVersion::new("3", None);

        assert!(newer.is_newer_than(&older));
        assert!(!older.is_newer_than(&newer));
        assert!(!older.is_newer_than(&older));
        assert!(older.is_newer_than(&undated));
    }
}
