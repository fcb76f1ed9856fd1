use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
#[clap(name = "parcel", version, about = "Install and upgrade plugin packages")]
pub struct Cli {
    /// Path to the configuration file
    #[clap(long, short, global = true, default_value = "parcel.yml")]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// List installed and available packages
    List {
        /// Only show installed packages
        #[clap(long)]
        installed: bool,
        /// Only show packages with a newer release available
        #[clap(long)]
        upgradable: bool,
    },
    /// Install packages by id
    Install {
        #[clap(required = true)]
        ids: Vec<String>,
        /// Install from this source instead of the newest release across all sources
        #[clap(long, short)]
        source: Option<String>,
    },
    /// Remove installed packages
    Uninstall {
        #[clap(required = true)]
        ids: Vec<String>,
    },
    /// Upgrade installed packages (all upgradable packages if no id is given)
    Upgrade { ids: Vec<String> },
    /// Show configured package sources
    Sources,
}
