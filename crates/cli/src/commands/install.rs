use eyre::{Result, eyre};
use parcel_pkg::{BatchReport, PackageManager, RemotePackage, RemotePackageIndex};

use crate::reporter::ConsoleReporter;

pub async fn handle_install_command(
    manager: &PackageManager,
    ids: &[String],
    source: Option<&str>,
) -> Result<()> {
    let remote: RemotePackageIndex = match source {
        Some(name) => manager.list_source(name).await?.into_iter().collect(),
        None => manager.list_remote().await?,
    };
    let (packages, missing) = select_packages(&remote, ids);

    for id in &missing {
        match source {
            Some(name) => eprintln!("❌ Package {} not found in source {}", id, name),
            None => eprintln!("❌ Package {} not found in any source", id),
        }
    }

    let report = manager.install_all(&packages, &ConsoleReporter).await;
    finish(report, missing.len())
}

pub async fn handle_uninstall_command(manager: &PackageManager, ids: &[String]) -> Result<()> {
    let report = manager.uninstall_all(ids, &ConsoleReporter).await;
    finish(report, 0)
}

pub async fn handle_upgrade_command(manager: &PackageManager, ids: &[String]) -> Result<()> {
    let upgradable = manager.upgradable().await?;

    let packages: Vec<RemotePackage> = upgradable
        .into_iter()
        .filter(|status| ids.is_empty() || ids.iter().any(|id| id == status.id()))
        .filter_map(|status| status.remote)
        .collect();

    if packages.is_empty() {
        println!("✅ Nothing to upgrade");
        return Ok(());
    }

    let report = manager.install_all(&packages, &ConsoleReporter).await;
    finish(report, 0)
}

/// Look up `ids` in `remote`, returning the packages found and the ids that were not.
fn select_packages(remote: &RemotePackageIndex, ids: &[String]) -> (Vec<RemotePackage>, Vec<String>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for id in ids {
        match remote.get(id) {
            Some(pkg) => found.push(pkg.clone()),
            None => missing.push(id.clone()),
        }
    }

    (found, missing)
}

fn finish(report: BatchReport, missing: usize) -> Result<()> {
    let failed = report.failed.len() + missing;
    println!(
        "📊 {} succeeded, {} failed",
        report.succeeded.len(),
        failed
    );

    if failed > 0 {
        return Err(eyre!("{} package(s) failed", failed));
    }
    Ok(())
}
