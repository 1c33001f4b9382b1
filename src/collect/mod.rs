//! Metadata collection service
//!
//! Writes catalog snapshots to the metadata directory, once per
//! (provider, version). A snapshot that already exists with content is
//! never rewritten, and a second collection issues no catalog pull.
//!
//! Writes go through a temporary file in the same directory and are moved
//! into place with a no-clobber rename. Inside one process a per-path lock
//! serializes the check and the write; across processes the rename lets
//! the first writer win.

pub mod docs;
pub mod snapshot;

pub use docs::{DocumentationSet, ProviderDocs};
pub use snapshot::{
    DumpColumn, MetadataSnapshot, RelationDump, TableSnapshot, load_snapshot, load_table_snapshot,
};

use crate::catalog::names;
use crate::context::table::table_params;
use crate::error::Result;
use crate::metadata::{MetadataProvider, ObjectIdentifier};
use chrono::Utc;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One async lock per snapshot path
static PATH_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Exclusive hold on one snapshot path; the map entry goes away with the
/// last holder.
struct PathGuard {
    path: PathBuf,
    _held: tokio::sync::OwnedMutexGuard<()>,
}

async fn lock_path(path: &Path) -> PathGuard {
    let lock = {
        let mut locks = PATH_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    };
    PathGuard {
        path: path.to_path_buf(),
        _held: lock.lock_owned().await,
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        let mut locks = PATH_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
        // only the map and this guard still reference the lock
        if locks
            .get(&self.path)
            .is_some_and(|lock| Arc::strong_count(lock) == 2)
        {
            locks.remove(&self.path);
        }
    }
}

/// What a collection run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// A new snapshot was written
    Collected(PathBuf),
    /// A snapshot was already there; nothing was queried or written
    AlreadyCollected(PathBuf),
}

impl CollectionOutcome {
    pub fn path(&self) -> &Path {
        match self {
            CollectionOutcome::Collected(p) | CollectionOutcome::AlreadyCollected(p) => p,
        }
    }
}

/// Writes metadata snapshots into one directory
#[derive(Debug, Clone)]
pub struct MetadataCollector {
    dir: PathBuf,
    docs: DocumentationSet,
}

impl MetadataCollector {
    pub fn new(dir: impl Into<PathBuf>, docs: DocumentationSet) -> Self {
        Self {
            dir: dir.into(),
            docs,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot the system catalog for the connected server's version
    pub async fn collect_metadata(&self, metadata: &MetadataProvider) -> Result<CollectionOutcome> {
        let provider = metadata.provider();
        let version = metadata.detect_server_version().await;
        let path = self.dir.join(sanitize_file_name(&format!(
            "{}_{}_system_tables.json",
            provider.file_prefix(),
            version
        )));

        let _guard = lock_path(&path).await;

        if let Some(existing) = check_existing(&path)? {
            tracing::info!(path = %path.display(), "metadata already collected, skipping");
            return Ok(existing);
        }

        let tables = metadata
            .execute_metadata_query(names::GET_SYSTEM_TABLES, &[])
            .await?;
        tracing::info!(provider = %provider, rows = tables.rows.len(), "system catalog pulled");

        let docs = self.docs.for_provider(provider);
        let snapshot = MetadataSnapshot {
            collected_at: Utc::now(),
            provider,
            version: version.clone(),
            description: format!(
                "{} system catalog metadata with catalog relationships and query patterns",
                provider
            ),
            system_tables: RelationDump::from_results(&tables),
            relationships: docs.relationships,
            query_patterns: docs.query_patterns,
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;
        persist_new(&self.dir, &path, json).await
    }

    /// Snapshot one table's columns and indexes.
    ///
    /// Uses the version the provider already knows rather than asking the
    /// server again.
    pub async fn collect_table_metadata(
        &self,
        metadata: &MetadataProvider,
        table: &ObjectIdentifier,
        profile: &str,
    ) -> Result<CollectionOutcome> {
        let provider = metadata.provider();
        let version = metadata.server_version().to_string();
        let path = self.dir.join(sanitize_file_name(&format!(
            "{}_table_{}_{}_{}_{}.json",
            provider.file_prefix(),
            table.schema,
            table.name,
            version,
            profile
        )));

        let _guard = lock_path(&path).await;

        if let Some(existing) = check_existing(&path)? {
            tracing::info!(path = %path.display(), "table metadata already collected, skipping");
            return Ok(existing);
        }

        let params = table_params(table);
        let columns = metadata
            .execute_metadata_query(names::GET_TABLE_COLUMNS, &params)
            .await?;
        let indexes = metadata
            .execute_metadata_query(names::GET_TABLE_INDEXES, &params)
            .await?;

        let snapshot = TableSnapshot {
            table: table.clone(),
            collected_at: Utc::now(),
            provider,
            version,
            profile: profile.to_string(),
            columns: RelationDump::from_results(&columns),
            indexes: RelationDump::from_results(&indexes),
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;
        persist_new(&self.dir, &path, json).await
    }
}

/// `AlreadyCollected` for a non-empty file; an empty leftover is removed
fn check_existing(path: &Path) -> io::Result<Option<CollectionOutcome>> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(Some(CollectionOutcome::AlreadyCollected(
            path.to_path_buf(),
        ))),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "removing empty snapshot file");
            std::fs::remove_file(path)?;
            Ok(None)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write `contents` to `path` only if nothing is there yet
async fn persist_new(dir: &Path, path: &Path, contents: Vec<u8>) -> Result<CollectionOutcome> {
    let dir = dir.to_path_buf();
    let path = path.to_path_buf();
    let outcome = tokio::task::spawn_blocking(move || -> io::Result<CollectionOutcome> {
        std::fs::create_dir_all(&dir)?;
        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        file.write_all(&contents)?;
        file.as_file().sync_all()?;
        match file.persist_noclobber(&path) {
            Ok(_) => Ok(CollectionOutcome::Collected(path)),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Ok(CollectionOutcome::AlreadyCollected(path))
            }
            Err(e) => Err(e.error),
        }
    })
    .await
    .map_err(io::Error::other)??;

    match &outcome {
        CollectionOutcome::Collected(p) => {
            tracing::info!(path = %p.display(), "snapshot written");
        }
        CollectionOutcome::AlreadyCollected(p) => {
            tracing::info!(path = %p.display(), "snapshot written concurrently elsewhere");
        }
    }
    Ok(outcome)
}

/// Replace anything that is not safe in a file name with `_`
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
