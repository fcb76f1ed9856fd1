use eyre::Result;
use parcel_pkg::{PackageManager, PackageStatus};

pub async fn handle_list_command(
    manager: &PackageManager,
    installed_only: bool,
    upgradable_only: bool,
) -> Result<()> {
    let statuses = if installed_only || upgradable_only {
        manager.installed_status().await?
    } else {
        manager.list().await?
    };

    let shown: Vec<&PackageStatus> = statuses
        .values()
        .filter(|status| !upgradable_only || status.upgradable())
        .collect();

    if shown.is_empty() {
        if upgradable_only {
            println!("✅ All packages are up to date");
        } else {
            println!("📦 No packages found");
            println!("💡 Add a source to your configuration file");
        }
        return Ok(());
    }

    println!("📦 Packages ({}):", shown.len());
    for status in shown {
        println!("  {}", describe(status));
    }
    Ok(())
}

fn describe(status: &PackageStatus) -> String {
    let name = status
        .local
        .as_ref()
        .map(|m| m.name.as_str())
        .or_else(|| status.remote.as_ref().map(|r| r.name.as_str()))
        .unwrap_or_default();

    match (&status.local, &status.remote) {
        (Some(local), Some(remote)) if status.upgradable() => format!(
            "⬆️ {} ({}) {} -> {}",
            status.id(),
            name,
            local.version,
            remote.version
        ),
        (Some(local), Some(_)) => format!("✅ {} ({}) {}", status.id(), name, local.version),
        (Some(local), None) => format!(
            "⚠️ {} ({}) {} [not in any source]",
            status.id(),
            name,
            local.version
        ),
        (None, Some(remote)) => format!("   {} ({}) {}", status.id(), name, remote.version),
        (None, None) => status.id().to_string(),
    }
}
