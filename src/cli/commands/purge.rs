//! Purge command implementation

use super::Workspace;
use crate::cli::error::CliError;
use crate::staging::StagingStore;
use std::path::PathBuf;

/// Arguments for the purge command
#[derive(Debug, Clone)]
pub struct PurgeArgs {
    pub workspace: PathBuf,
    /// Only remove entries whose time-to-live has passed
    pub expired_only: bool,
}

/// Handle the purge command, returning how many staged uploads were removed.
pub fn handle_purge(args: &PurgeArgs) -> Result<usize, CliError> {
    let workspace = Workspace::load(&args.workspace)?;
    let staging = workspace.staging_store();

    let removed = if args.expired_only {
        staging.purge_expired()?
    } else {
        staging.purge()?
    };

    println!(
        "Removed {} staged upload{} from {}",
        removed,
        if removed == 1 { "" } else { "s" },
        staging.dir().display()
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use crate::staging::StagingEntry;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_purge_clears_staging_dir() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::load(dir.path()).unwrap();
        let staging = workspace.staging_store();
        let entry = StagingEntry::new(vec![json!({"a": 1})], "post", "a.json");
        staging
            .put(UserId(1), &entry, chrono::Duration::hours(1))
            .unwrap();
        staging
            .put(UserId(1), &entry, chrono::Duration::hours(1))
            .unwrap();

        let args = PurgeArgs {
            workspace: dir.path().to_path_buf(),
            expired_only: true,
        };
        assert_eq!(handle_purge(&args).unwrap(), 0);

        let args = PurgeArgs {
            expired_only: false,
            ..args
        };
        assert_eq!(handle_purge(&args).unwrap(), 2);
        assert_eq!(handle_purge(&args).unwrap(), 0);
    }
}
