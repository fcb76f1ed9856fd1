use parcel_pkg::{ManagerConfig, SourceKind};

pub fn handle_sources_command(config: &ManagerConfig) {
    println!("📂 Install directory: {}", config.install_dir.display());

    if config.sources.is_empty() {
        println!("📭 No sources configured");
        return;
    }

    println!("🏪 Sources ({}):", config.sources.len());
    for source in &config.sources {
        let kind = match &source.kind {
            SourceKind::Http { .. } => "http",
            SourceKind::Local { .. } => "local",
        };
        let state = if source.enabled { "✅" } else { "⏸️" };
        println!("  {} {} [{}] {}", state, source.name, kind, source.location());
        if let Some(local_path) = &source.local_path {
            println!("     installs into {}", config.install_dir.join(local_path).display());
        }
    }
}
