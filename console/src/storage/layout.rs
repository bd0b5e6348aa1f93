//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Storage layout for the console daemon
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the stack definitions directory
    pub fn stacks_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("stacks"))
    }

    /// Get the audit log file path
    pub fn audit_log_file(&self) -> File {
        File::new(self.base_dir.join("audit.log"))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::ConsoleError> {
        self.stacks_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        // Use /etc/bosun on Linux, or the working directory elsewhere
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/etc/bosun");

        #[cfg(not(target_os = "linux"))]
        let base_dir = PathBuf::from(".bosun");

        Self::new(base_dir)
    }
}
