use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ArtifactsConfig;
use crate::error::{ArtifactNotFound, StoreError};

/// Reference to a finalized artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub id: Uuid,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub size: usize,
}

impl ArtifactRef {
    /// Listener-facing address, e.g. "/tts/<id>" or "<base>/tts/<id>"
    pub fn address(&self, public_base_url: Option<&str>) -> String {
        match public_base_url {
            Some(base) => format!("{}/tts/{}", base.trim_end_matches('/'), self.id),
            None => format!("/tts/{}", self.id),
        }
    }
}

/// Artifact contents returned by `read`
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: Uuid,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
struct Entry {
    path: PathBuf,
    mime_type: String,
    created_at: DateTime<Utc>,
    size: usize,
}

/// Exclusive write access to an artifact that is not readable yet.
///
/// Dropping the handle without finalizing discards the staged bytes.
pub struct ArtifactHandle {
    id: Uuid,
    mime_type: String,
    staging_path: PathBuf,
    file: Option<fs::File>,
    written: usize,
}

impl ArtifactHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Append bytes to the staged artifact
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        if let Some(file) = &mut self.file {
            file.write_all(chunk).await?;
            self.written += chunk.len();
        }
        Ok(())
    }
}

impl Drop for ArtifactHandle {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            if let Err(e) = std::fs::remove_file(&self.staging_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to discard staged artifact {}: {}", self.id, e);
                }
            }
        }
    }
}

struct StoreInner {
    dir: PathBuf,
    ttl: chrono::Duration,
    sweep_interval: chrono::Duration,
    entries: RwLock<HashMap<Uuid, Entry>>,
    last_sweep: parking_lot::Mutex<DateTime<Utc>>,
}

/// Disk-backed artifact store with an in-memory index.
///
/// Content is staged under a temporary name and renamed into place on
/// finalize, so a reader sees either the complete file or nothing.
#[derive(Clone)]
pub struct ArtifactStore {
    inner: Arc<StoreInner>,
}

impl ArtifactStore {
    /// Open the store, discarding files left by a previous process
    pub async fn open(
        dir: impl AsRef<Path>,
        ttl: Duration,
        sweep_interval: Duration,
    ) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut stale = 0usize;
        let mut listing = fs::read_dir(&dir).await?;
        while let Some(item) = listing.next_entry().await? {
            let name = item.file_name();
            if item.file_type().await?.is_file() && is_artifact_file(&name.to_string_lossy()) {
                fs::remove_file(item.path()).await?;
                stale += 1;
            }
        }

        info!(
            "Artifact store ready at {} (ttl={}s, removed {} stale files)",
            dir.display(),
            ttl.as_secs(),
            stale
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                dir,
                ttl: to_chrono(ttl),
                sweep_interval: to_chrono(sweep_interval),
                entries: RwLock::new(HashMap::new()),
                last_sweep: parking_lot::Mutex::new(Utc::now()),
            }),
        })
    }

    pub async fn from_config(config: &ArtifactsConfig) -> Result<Self, StoreError> {
        Self::open(&config.dir, config.ttl(), config.sweep_interval()).await
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl.to_std().unwrap_or_default()
    }

    /// Reserve a new artifact. Runs a sweep first when one is due.
    pub async fn allocate(&self, mime_type: &str) -> Result<ArtifactHandle, StoreError> {
        let now = Utc::now();
        let due = {
            let last = self.inner.last_sweep.lock();
            now - *last >= self.inner.sweep_interval
        };
        if due {
            self.sweep(now).await;
        }

        let id = Uuid::new_v4();
        let staging_path = self.inner.dir.join(format!(".{}.part", id));
        let file = fs::File::create(&staging_path).await?;

        debug!(artifact_id = %id, mime_type, "Artifact allocated");

        Ok(ArtifactHandle {
            id,
            mime_type: mime_type.to_string(),
            staging_path,
            file: Some(file),
            written: 0,
        })
    }

    /// Commit the remaining bytes and make the artifact readable by id
    pub async fn finalize(
        &self,
        mut handle: ArtifactHandle,
        bytes: &[u8],
    ) -> Result<ArtifactRef, StoreError> {
        handle.write(bytes).await?;

        if let Some(mut file) = handle.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        let final_path = self.inner.dir.join(handle.id.to_string());
        if let Err(e) = fs::rename(&handle.staging_path, &final_path).await {
            let _ = fs::remove_file(&handle.staging_path).await;
            return Err(e.into());
        }

        let entry = Entry {
            path: final_path,
            mime_type: handle.mime_type.clone(),
            created_at: Utc::now(),
            size: handle.written,
        };

        let artifact = ArtifactRef {
            id: handle.id,
            mime_type: entry.mime_type.clone(),
            created_at: entry.created_at,
            size: entry.size,
        };

        self.inner.entries.write().await.insert(handle.id, entry);

        debug!(artifact_id = %artifact.id, size = artifact.size, "Artifact finalized");
        Ok(artifact)
    }

    /// Allocate + finalize in one step
    pub async fn store(&self, mime_type: &str, bytes: &[u8]) -> Result<ArtifactRef, StoreError> {
        let handle = self.allocate(mime_type).await?;
        self.finalize(handle, bytes).await
    }

    pub async fn read(&self, id: &str) -> Result<Artifact, ArtifactNotFound> {
        self.read_at(id, Utc::now()).await
    }

    /// Read as of `now`: expired artifacts are not found even before a sweep
    pub async fn read_at(&self, id: &str, now: DateTime<Utc>) -> Result<Artifact, ArtifactNotFound> {
        let not_found = || ArtifactNotFound(id.to_string());

        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;
        let entry = {
            let entries = self.inner.entries.read().await;
            entries.get(&uuid).cloned().ok_or_else(not_found)?
        };

        if self.is_expired(&entry, now) {
            return Err(not_found());
        }

        // A sweep may unlink the file after the index lookup
        let bytes = fs::read(&entry.path).await.map_err(|_| not_found())?;

        Ok(Artifact {
            id: uuid,
            mime_type: entry.mime_type,
            created_at: entry.created_at,
            bytes: Bytes::from(bytes),
        })
    }

    /// Delete every artifact whose `created_at + ttl < now`
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        *self.inner.last_sweep.lock() = now;

        let expired: Vec<(Uuid, Entry)> = {
            let mut entries = self.inner.entries.write().await;
            let ids: Vec<Uuid> = entries
                .iter()
                .filter(|(_, entry)| self.is_expired(entry, now))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| entries.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        for (id, entry) in &expired {
            if let Err(e) = fs::remove_file(&entry.path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(artifact_id = %id, "Failed to delete expired artifact: {}", e);
                }
            }
        }

        if !expired.is_empty() {
            info!("Swept {} expired artifacts", expired.len());
        }

        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        entry
            .created_at
            .checked_add_signed(self.inner.ttl)
            .is_some_and(|deadline| deadline < now)
    }
}

/// Only files this store could have written: "<uuid>" or ".<uuid>.part"
fn is_artifact_file(name: &str) -> bool {
    let stem = name
        .strip_prefix('.')
        .and_then(|rest| rest.strip_suffix(".part"))
        .unwrap_or(name);
    Uuid::parse_str(stem).is_ok()
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
