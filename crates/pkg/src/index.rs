//! Indices over local and remote packages, and their merged status view.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::ops::Deref;

use tracing::debug;

use crate::models::{Manifest, RemotePackage};

/// Remote packages keyed by id, merged across repositories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemotePackageIndex(BTreeMap<String, RemotePackage>);

impl RemotePackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package, keeping whichever entry for its id has the later date.
    ///
    /// Equal dates keep the entry that was added first.
    pub fn merge(&mut self, pkg: RemotePackage) {
        match self.0.entry(pkg.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(pkg);
            }
            Entry::Occupied(mut slot) => {
                if pkg.version.is_newer_than(&slot.get().version) {
                    debug!(
                        "Package '{}' from {} supersedes {}",
                        pkg.id,
                        source_name(&pkg),
                        source_name(slot.get())
                    );
                    slot.insert(pkg);
                }
            }
        }
    }

    pub fn merge_all(&mut self, packages: impl IntoIterator<Item = RemotePackage>) {
        for pkg in packages {
            self.merge(pkg);
        }
    }

    pub fn into_inner(self) -> BTreeMap<String, RemotePackage> {
        self.0
    }
}

fn source_name(pkg: &RemotePackage) -> &str {
    pkg.repository().map(|r| r.path()).unwrap_or("<unknown>")
}

impl Deref for RemotePackageIndex {
    type Target = BTreeMap<String, RemotePackage>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<RemotePackage> for RemotePackageIndex {
    fn from_iter<I: IntoIterator<Item = RemotePackage>>(iter: I) -> Self {
        let mut index = Self::new();
        index.merge_all(iter);
        index
    }
}

impl IntoIterator for RemotePackageIndex {
    type Item = (String, RemotePackage);
    type IntoIter = std::collections::btree_map::IntoIter<String, RemotePackage>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Installed packages keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalPackageIndex(BTreeMap<String, Manifest>);

impl LocalPackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, manifest: Manifest) {
        self.0.insert(manifest.id.clone(), manifest);
    }

    pub fn into_inner(self) -> BTreeMap<String, Manifest> {
        self.0
    }
}

impl Deref for LocalPackageIndex {
    type Target = BTreeMap<String, Manifest>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Manifest> for LocalPackageIndex {
    fn from_iter<I: IntoIterator<Item = Manifest>>(iter: I) -> Self {
        let mut index = Self::new();
        for manifest in iter {
            index.insert(manifest);
        }
        index
    }
}

impl IntoIterator for LocalPackageIndex {
    type Item = (String, Manifest);
    type IntoIter = std::collections::btree_map::IntoIter<String, Manifest>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Local and remote view of a single package id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageStatus {
    pub local: Option<Manifest>,
    pub remote: Option<RemotePackage>,
}

impl PackageStatus {
    /// True when installed and a repository offers a strictly newer date.
    pub fn upgradable(&self) -> bool {
        match (&self.local, &self.remote) {
            (Some(local), Some(remote)) => remote.version.is_newer_than(&local.version),
            _ => false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.local.is_some()
    }

    /// Installed, but no configured repository lists it.
    pub fn is_orphaned(&self) -> bool {
        self.local.is_some() && self.remote.is_none()
    }

    /// Listed by a repository but not installed.
    pub fn is_available(&self) -> bool {
        self.local.is_none() && self.remote.is_some()
    }

    pub fn id(&self) -> &str {
        self.local
            .as_ref()
            .map(|m| m.id.as_str())
            .or_else(|| self.remote.as_ref().map(|r| r.id.as_str()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageStatusIndex(BTreeMap<String, PackageStatus>);

impl PackageStatusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry for every installed package, paired with its remote by id.
    pub fn populate_local(&mut self, local: &LocalPackageIndex, remote: &RemotePackageIndex) {
        for (id, manifest) in local.iter() {
            self.0.insert(
                id.clone(),
                PackageStatus {
                    local: Some(manifest.clone()),
                    remote: remote.get(id).cloned(),
                },
            );
        }
    }

    /// Add an entry for every remote package not already present.
    pub fn populate_remote(&mut self, remote: &RemotePackageIndex) {
        for (id, pkg) in remote.iter() {
            self.0.entry(id.clone()).or_insert_with(|| PackageStatus {
                local: None,
                remote: Some(pkg.clone()),
            });
        }
    }

    pub fn upgradable(&self) -> impl Iterator<Item = &PackageStatus> {
        self.0.values().filter(|status| status.upgradable())
    }

    pub fn into_inner(self) -> BTreeMap<String, PackageStatus> {
        self.0
    }
}

impl Deref for PackageStatusIndex {
    type Target = BTreeMap<String, PackageStatus>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for PackageStatusIndex {
    type Item = (String, PackageStatus);
    type IntoIter = std::collections::btree_map::IntoIter<String, PackageStatus>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PackageVersion, parse_package_date};

    fn dated(id: &str, label: &str, date: Option<&str>) -> RemotePackage {
        let date = date.map(|d| parse_package_date(d).unwrap());
        RemotePackage::new(id, id.to_uppercase()).with_version(PackageVersion::new(label, date))
    }

    fn manifest(id: &str, date: Option<&str>) -> Manifest {
        Manifest::from(&dated(id, "installed", date))
    }

    #[test]
    fn test_merge_newest_wins_in_any_order() {
        let a = dated("foo", "a", Some("2024-01-01 00:00:00 +0000"));
        let b = dated("foo", "b", Some("2024-02-01 00:00:00 +0000"));

        let forward: RemotePackageIndex = vec![a.clone(), b.clone()].into_iter().collect();
        let backward: RemotePackageIndex = vec![b, a].into_iter().collect();

        assert_eq!(forward["foo"].version.version, "b");
        assert_eq!(backward["foo"].version.version, "b");
    }

    #[test]
    fn test_merge_tie_keeps_first() {
        let first = dated("foo", "first", Some("2024-01-01 00:00:00 +0000"));
        let second = dated("foo", "second", Some("2024-01-01 00:00:00 +0000"));

        let index: RemotePackageIndex = vec![first, second].into_iter().collect();
        assert_eq!(index["foo"].version.version, "first");
    }

    #[test]
    fn test_merge_dated_beats_undated() {
        let undated = dated("foo", "undated", None);
        let with_date = dated("foo", "dated", Some("2020-01-01 00:00:00 +0000"));

        let index: RemotePackageIndex = vec![undated, with_date].into_iter().collect();
        assert_eq!(index["foo"].version.version, "dated");
    }

    #[test]
    fn test_offsets_compare_by_instant() {
        // 12:00 +0200 is 10:00 UTC, earlier than 11:00 UTC.
        let early = dated("foo", "early", Some("2024-01-01 12:00:00 +0200"));
        let late = dated("foo", "late", Some("2024-01-01 11:00:00 +0000"));

        let index: RemotePackageIndex = vec![late, early].into_iter().collect();
        assert_eq!(index["foo"].version.version, "late");
    }

    #[test]
    fn test_upgradable_truth_table() {
        let old = "2024-01-01 00:00:00 +0000";
        let new = "2024-06-01 00:00:00 +0000";

        let status = |local: Option<&str>, remote: Option<&str>| PackageStatus {
            local: Some(manifest("foo", local)),
            remote: Some(dated("foo", "r", remote)),
        };

        assert!(status(Some(old), Some(new)).upgradable());
        assert!(!status(Some(new), Some(old)).upgradable());
        assert!(!status(Some(old), Some(old)).upgradable());
        assert!(status(None, Some(old)).upgradable());
        assert!(!status(Some(old), None).upgradable());

        let orphan = PackageStatus {
            local: Some(manifest("foo", Some(old))),
            remote: None,
        };
        assert!(!orphan.upgradable());
        assert!(orphan.is_orphaned());

        let available = PackageStatus {
            local: None,
            remote: Some(dated("foo", "r", Some(new))),
        };
        assert!(!available.upgradable());
        assert!(available.is_available());
        assert_eq!(available.id(), "foo");
    }

    #[test]
    fn test_status_index_covers_union() {
        let local: LocalPackageIndex = vec![
            manifest("installed-only", None),
            manifest("both", Some("2024-01-01 00:00:00 +0000")),
        ]
        .into_iter()
        .collect();
        let remote: RemotePackageIndex = vec![
            dated("both", "new", Some("2024-02-01 00:00:00 +0000")),
            dated("remote-only", "x", None),
        ]
        .into_iter()
        .collect();

        let mut statuses = PackageStatusIndex::new();
        statuses.populate_local(&local, &remote);
        assert_eq!(statuses.len(), 2);

        statuses.populate_remote(&remote);
        assert_eq!(statuses.len(), 3);

        assert!(statuses["installed-only"].is_orphaned());
        assert!(statuses["both"].is_installed());
        assert!(statuses["both"].remote.is_some());
        assert!(statuses["remote-only"].local.is_none());

        let upgradable: Vec<_> = statuses.upgradable().map(|s| s.id()).collect();
        assert_eq!(upgradable, vec!["both"]);
    }

    #[test]
    fn test_populate_remote_does_not_overwrite_local() {
        let local: LocalPackageIndex = vec![manifest("foo", None)].into_iter().collect();
        let remote: RemotePackageIndex = vec![dated("foo", "r", None)].into_iter().collect();

        let mut statuses = PackageStatusIndex::new();
        statuses.populate_local(&local, &remote);
        statuses.populate_remote(&remote);

        assert_eq!(statuses.len(), 1);
        assert!(statuses["foo"].local.is_some());
    }
}
