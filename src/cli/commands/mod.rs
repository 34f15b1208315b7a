//! CLI command implementations

pub mod import;
pub mod purge;

use crate::cli::error::CliError;
use crate::config::ImporterConfig;
use crate::models::UserId;
use crate::platform::{MemoryContentStore, RecordType};
use crate::staging::FileStagingStore;
use std::path::{Path, PathBuf};

/// User every CLI import runs as
pub const CLI_USER: UserId = UserId(1);

/// Login of [`CLI_USER`]
pub const CLI_USER_LOGIN: &str = "admin";

/// Destination types offered when none are given
pub const DEFAULT_RECORD_TYPES: &[&str] = &["post", "page"];

/// Configuration and staging location for one CLI invocation.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub dir: PathBuf,
    pub config: ImporterConfig,
}

impl Workspace {
    /// Load `.bulk-import.toml` (if any) and environment overrides from `dir`.
    pub fn load(dir: &Path) -> Result<Self, CliError> {
        Ok(Self {
            dir: dir.to_path_buf(),
            config: ImporterConfig::load(dir)?,
        })
    }

    pub fn staging_store(&self) -> FileStagingStore {
        FileStagingStore::new(self.config.staging_dir_in(&self.dir))
            .with_prefix(&self.config.token_prefix)
    }
}

/// In-memory host offering `record_types` (or the defaults when empty).
pub fn content_store(record_types: &[String]) -> MemoryContentStore {
    let types = if record_types.is_empty() {
        DEFAULT_RECORD_TYPES.iter().map(|t| record_type(t)).collect()
    } else {
        record_types.iter().map(|t| record_type(t)).collect()
    };
    MemoryContentStore::new(types).with_user(CLI_USER, CLI_USER_LOGIN)
}

fn record_type(name: &str) -> RecordType {
    let name = name.trim().to_lowercase();
    let mut chars = name.chars();
    let label = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    RecordType::new(name, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ContentStore;

    #[test]
    fn test_content_store_defaults() {
        let store = content_store(&[]);
        let names: Vec<String> = store.importable_types().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["post", "page"]);
        assert_eq!(store.resolve_user("admin"), Some(CLI_USER));
    }

    #[test]
    fn test_content_store_custom_types() {
        let store = content_store(&["Product".to_string()]);
        let types = store.importable_types();
        assert_eq!(types, vec![RecordType::new("product", "Product")]);
    }
}
