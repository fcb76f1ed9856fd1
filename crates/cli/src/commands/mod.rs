pub mod install;
pub mod list;
pub mod sources;

pub use install::{handle_install_command, handle_uninstall_command, handle_upgrade_command};
pub use list::handle_list_command;
pub use sources::handle_sources_command;
