use parcel_pkg::{Operation, PackageError, ProgressReporter};

/// Prints one line per package event.
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_start(&self, id: &str, operation: Operation) {
        match operation {
            Operation::Install => println!("📦 Installing {}...", id),
            Operation::Uninstall => println!("🗑️ Removing {}...", id),
        }
    }

    fn on_success(&self, id: &str, operation: Operation) {
        match operation {
            Operation::Install => println!("✅ Installed {}", id),
            Operation::Uninstall => println!("✅ Removed {}", id),
        }
    }

    fn on_failure(&self, id: &str, operation: Operation, error: &PackageError) {
        eprintln!("❌ Failed to {} {}: {}", operation, id, error);
    }
}
