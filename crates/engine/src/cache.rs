//! Local copies of stored documents.
//!
//! Documents never change once uploaded, so a file present in the cache
//! directory is trusted without checksum or expiry. The directory is wiped
//! wholesale with [`DocumentCache::clear`] when the process starts.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex as StdMutex, PoisonError},
};

use api_types::document::DocumentRef;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::{io::AsyncWriteExt, sync::Mutex};

use crate::{EngineError, ResultEngine, service::ExpenseService};

const WILDCARD_MIME: &str = "*/*";
const PART_SUFFIX: &str = ".part";

/// A document available on the local file system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalDocument {
    pub path: PathBuf,
    pub mime_type: String,
    /// `true` when no download was needed.
    pub from_cache: bool,
}

impl LocalDocument {
    pub(crate) fn new(path: PathBuf, from_cache: bool) -> Self {
        let mime_type = mime_for(&path);
        Self {
            path,
            mime_type,
            from_cache,
        }
    }
}

#[derive(Debug)]
pub struct DocumentCache {
    root: PathBuf,
    in_flight: StdMutex<InFlightMap>,
}

type InFlightMap = HashMap<String, Arc<Mutex<()>>>;

impl DocumentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            in_flight: StdMutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Removes every cached document.
    pub async fn clear(&self) -> ResultEngine<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        tokio::fs::create_dir_all(&self.root).await?;
        tracing::debug!(root = %self.root.display(), "document cache cleared");
        Ok(())
    }

    /// Name of the cache file for `doc`.
    ///
    /// Hashing the whole storage path keeps two same-named files from
    /// different directories apart; the file name is kept so the extension
    /// still drives the MIME type.
    pub fn cache_key(doc: &DocumentRef) -> String {
        let digest = Sha256::digest(doc.normalized_path().as_bytes());
        let hash = hex::encode(digest);
        format!("{}_{}", &hash[..16], doc.file_name())
    }

    /// Path `doc` is (or will be) cached at.
    pub fn path_for(&self, doc: &DocumentRef) -> PathBuf {
        self.root.join(Self::cache_key(doc))
    }

    /// Returns a local copy of `doc`, downloading it on first access.
    pub async fn resolve(
        &self,
        service: &dyn ExpenseService,
        doc: &DocumentRef,
    ) -> ResultEngine<LocalDocument> {
        let key = Self::cache_key(doc);
        let entry = InFlight::join(&self.in_flight, &key);
        let _turn = entry.slot.lock().await;
        self.resolve_locked(service, doc, &key).await
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        lock_map(&self.in_flight).len()
    }

    async fn resolve_locked(
        &self,
        service: &dyn ExpenseService,
        doc: &DocumentRef,
        key: &str,
    ) -> ResultEngine<LocalDocument> {
        let target = self.root.join(key);
        if is_cached(&target).await {
            tracing::debug!(path = %doc.relative_path, "document cache hit");
            return Ok(LocalDocument::new(target, true));
        }

        tracing::debug!(path = %doc.relative_path, "document cache miss");
        let (directory, filename) = doc.split_path();
        if filename.is_empty() {
            return Err(EngineError::Download(format!(
                "invalid storage path: {}",
                doc.relative_path
            )));
        }

        let stream = service
            .load_file(&directory, &filename)
            .await
            .map_err(|err| match err {
                EngineError::Connection(_) => err,
                EngineError::NotFound(_) => {
                    EngineError::Download(format!("{} is not available", doc.relative_path))
                }
                other => {
                    tracing::warn!(path = %doc.relative_path, "document storage failed: {other}");
                    EngineError::Download(format!("{}: {other}", doc.relative_path))
                }
            })?
            .ok_or_else(|| {
                EngineError::Download(format!("{} is not available", doc.relative_path))
            })?;

        let partial = self.root.join(format!("{key}{PART_SUFFIX}"));
        if let Err(err) = write_stream(&partial, &target, stream).await {
            let _ = tokio::fs::remove_file(&partial).await;
            tracing::warn!(path = %doc.relative_path, "document download failed: {err}");
            return Err(EngineError::Download(format!("{}: {err}", doc.relative_path)));
        }

        tracing::debug!(path = %doc.relative_path, target = %target.display(), "document cached");
        Ok(LocalDocument::new(target, false))
    }
}

/// Membership of one caller in the per-key lock table.
///
/// The entry for `key` is removed when the last member leaves, whether its
/// resolve completed or was dropped half way.
struct InFlight<'a> {
    map: &'a StdMutex<InFlightMap>,
    key: &'a str,
    slot: Arc<Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn join(map: &'a StdMutex<InFlightMap>, key: &'a str) -> Self {
        let slot = lock_map(map).entry(key.to_string()).or_default().clone();
        Self { map, key, slot }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut map = lock_map(self.map);
        let ours = map
            .get(self.key)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot));
        // Only the table and this member are left.
        if ours && Arc::strong_count(&self.slot) == 2 {
            map.remove(self.key);
        }
    }
}

fn lock_map(map: &StdMutex<InFlightMap>) -> std::sync::MutexGuard<'_, InFlightMap> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn is_cached(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Writes the stream to `partial` and moves it onto `target` once complete.
async fn write_stream(
    partial: &Path,
    target: &Path,
    mut stream: crate::service::DocumentStream,
) -> std::io::Result<()> {
    if let Some(parent) = partial.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(partial).await?;
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(partial, target).await
}

/// MIME type guessed from the file extension, `*/*` when unknown.
pub fn mime_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(WILDCARD_MIME)
        .to_string()
}
