//! Snapshot CLI commands

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::snapshot::{restore, save};
use crate::store::StoreClient;

#[derive(Subcommand, Debug, Clone)]
pub enum SnapshotCommands {
    /// Save every engine of every namespace into a directory
    #[command(
        after_help = "EXAMPLES:\n    # Snapshot the whole store\n    vkv snapshot save -d ./snap\n\n    # Snapshot one namespace, skipping unreadable paths\n    vkv snapshot save -n team -d ./snap --skip-errors"
    )]
    Save {
        /// Namespace to start from
        #[arg(short, long, env = "VKV_SNAPSHOT_SAVE_NAMESPACE", default_value = "")]
        namespace: String,

        /// Directory to write the snapshot into
        #[arg(short, long, env = "VKV_SNAPSHOT_SAVE_DESTINATION", value_name = "DIR")]
        destination: PathBuf,

        /// Skip paths that cannot be listed or read
        #[arg(long, env = "VKV_SNAPSHOT_SAVE_SKIP_ERRORS")]
        skip_errors: bool,
    },

    /// Recreate namespaces, engines and secrets from a snapshot directory
    #[command(after_help = "EXAMPLES:\n    # Restore a snapshot\n    vkv snapshot restore -s ./snap")]
    Restore {
        /// Snapshot directory
        #[arg(short, long, env = "VKV_SNAPSHOT_RESTORE_SOURCE", value_name = "DIR")]
        source: PathBuf,
    },
}

/// Handle snapshot commands
pub async fn handle_snapshot_command(
    command: SnapshotCommands,
    client: &dyn StoreClient,
    progress: &mut dyn Write,
) -> Result<()> {
    match command {
        SnapshotCommands::Save { namespace, destination, skip_errors } => {
            let report = save(client, &destination, &namespace, skip_errors, progress)
                .await
                .with_context(|| format!("Failed to save snapshot to {}", destination.display()))?;
            tracing::info!(files = report.files.len(), "Snapshot saved");
        }
        SnapshotCommands::Restore { source } => {
            let report = restore(client, &source, progress).await.with_context(|| {
                format!("Failed to restore snapshot from {}", source.display())
            })?;
            tracing::info!(
                namespaces = report.namespaces.len(),
                engines = report.engines.len(),
                secrets = report.leaves,
                "Snapshot restored"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, SecretLeaf};

    #[tokio::test]
    async fn test_save_then_restore_into_fresh_store() {
        let source = InMemoryStore::new();
        source.put("team", "kv", "app/db", SecretLeaf::from_pairs([("user", "admin")])).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let save = SnapshotCommands::Save {
            namespace: String::new(),
            destination: dir.path().to_path_buf(),
            skip_errors: false,
        };
        handle_snapshot_command(save, &source, &mut std::io::sink()).await.unwrap();

        let target = InMemoryStore::new();
        let restore = SnapshotCommands::Restore { source: dir.path().to_path_buf() };
        let mut progress = Vec::new();
        handle_snapshot_command(restore, &target, &mut progress).await.unwrap();

        assert!(target.has_namespace("team").unwrap());
        assert_eq!(target.leaves("team", "kv").unwrap(), source.leaves("team", "kv").unwrap());
        assert!(String::from_utf8(progress).unwrap().contains("kv.yaml"));
    }

    #[tokio::test]
    async fn test_restore_missing_directory_has_context() {
        let restore = SnapshotCommands::Restore { source: PathBuf::from("/nonexistent/snap") };
        let err = handle_snapshot_command(restore, &InMemoryStore::new(), &mut std::io::sink())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/snap"));
    }
}
