//! On-disk cache storage
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<slug>-<digest>/cache.json      cache name and creation time
//! <root>/<slug>-<digest>/<sha256>.entry  one JSON header line, then the body
//! ```
//!
//! Entry files are written under a temporary name and renamed into place,
//! so a reader never sees a half-written entry. A batch either commits
//! whole or is rolled back to the entries it replaced.

use crate::cache::{Cache, CacheStorage, CachedEntry};
use crate::error::{PrecacheError, PrecacheResult};
use crate::http::{Headers, RequestKey, Response};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

const CACHE_META_FILE: &str = "cache.json";
const ENTRY_EXTENSION: &str = "entry";

/// Longest readable prefix kept in a cache directory name
const MAX_SLUG_LEN: usize = 48;

/// Metadata written once per cache directory
#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta {
    name: String,
    created_at: DateTime<Utc>,
}

/// Header line of an entry file
#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    key: RequestKey,
    status: u16,
    status_text: String,
    headers: Headers,
    #[serde(default)]
    vary: BTreeMap<String, Option<String>>,
    stored_at: DateTime<Utc>,
}

/// Cache storage rooted at a directory
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Directory for a cache name
    ///
    /// Generation identifiers are free-form, so the directory name is a
    /// filesystem-safe slug plus a digest of the exact name.
    fn cache_dir(&self, name: &str) -> PathBuf {
        let slug: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .take(MAX_SLUG_LEN)
            .collect();
        let digest = hex::encode(Sha256::digest(name.as_bytes()));
        self.root.join(format!("{}-{}", slug, &digest[..12]))
    }

    async fn read_meta(dir: &Path) -> PrecacheResult<Option<CacheMeta>> {
        let path = dir.join(CACHE_META_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PrecacheError::io(
                format!("reading {}", path.display()),
                e,
            )),
        }
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> PrecacheResult<Arc<dyn Cache>> {
        let dir = self.cache_dir(name);

        if Self::read_meta(&dir).await?.is_none() {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| PrecacheError::io(format!("creating {}", dir.display()), e))?;

            let meta = CacheMeta {
                name: name.to_string(),
                created_at: Utc::now(),
            };
            let bytes = serde_json::to_vec_pretty(&meta)?;
            write_atomic(&dir.join(CACHE_META_FILE), &bytes).await?;
            debug!("Created cache {} at {}", name, dir.display());
        }

        Ok(Arc::new(DiskCache {
            name: name.to_string(),
            dir,
        }))
    }

    async fn has(&self, name: &str) -> PrecacheResult<bool> {
        Ok(Self::read_meta(&self.cache_dir(name)).await?.is_some())
    }

    async fn keys(&self) -> PrecacheResult<Vec<String>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PrecacheError::io(
                    format!("listing {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut metas = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| PrecacheError::io(format!("listing {}", self.root.display()), e))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            // An unnamed cache could never be deleted by activation
            match Self::read_meta(&path).await {
                Ok(Some(meta)) => metas.push(meta),
                Ok(None) => debug!("Ignoring {} without {}", path.display(), CACHE_META_FILE),
                Err(e) => {
                    return Err(PrecacheError::storage(
                        format!("reading cache {}", path.display()),
                        format!("{}; remove the directory to recover", e),
                    ))
                }
            }
        }

        metas.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(metas.into_iter().map(|meta| meta.name).collect())
    }

    async fn delete(&self, name: &str) -> PrecacheResult<bool> {
        let dir = self.cache_dir(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Deleted cache {} at {}", name, dir.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PrecacheError::io(format!("deleting {}", dir.display()), e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}

/// A cache backed by one directory
#[derive(Debug)]
pub struct DiskCache {
    name: String,
    dir: PathBuf,
}

impl DiskCache {
    fn entry_path(&self, key: &RequestKey) -> PathBuf {
        let digest = Sha256::digest(key.to_string().as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION))
    }

    async fn read_entry(path: &Path) -> PrecacheResult<Option<CachedEntry>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PrecacheError::io(format!("reading {}", path.display()), e)),
        };
        decode_entry(&bytes).map(Some).map_err(|reason| {
            PrecacheError::storage(format!("reading {}", path.display()), reason)
        })
    }
}

#[async_trait]
impl Cache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, key: &RequestKey) -> PrecacheResult<Option<CachedEntry>> {
        Self::read_entry(&self.entry_path(key)).await
    }

    async fn store(&self, entries: Vec<CachedEntry>) -> PrecacheResult<()> {
        // Stage every file first; only rename once all writes succeeded
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(entries.len());
        for entry in &entries {
            let target = self.entry_path(&entry.key);
            let temp = temp_path(&target);
            let bytes = match encode_entry(entry) {
                Ok(bytes) => bytes,
                Err(e) => {
                    discard(&staged).await;
                    return Err(e);
                }
            };

            if let Err(e) = fs::write(&temp, bytes).await {
                let _ = fs::remove_file(&temp).await;
                discard(&staged).await;
                return Err(PrecacheError::io(format!("writing {}", temp.display()), e));
            }
            staged.push((temp, target));
        }

        let mut committed: Vec<Committed> = Vec::with_capacity(staged.len());
        for (index, (temp, target)) in staged.iter().enumerate() {
            match commit_one(temp, target).await {
                Ok(done) => committed.push(done),
                Err(e) => {
                    discard(&staged[index..]).await;
                    roll_back(&committed).await;
                    return Err(e);
                }
            }
        }

        for done in &committed {
            if let Some(backup) = &done.backup {
                if let Err(e) = fs::remove_file(backup).await {
                    warn!("Failed to remove replaced entry {}: {}", backup.display(), e);
                }
            }
        }
        Ok(())
    }

    async fn remove(&self, key: &RequestKey) -> PrecacheResult<bool> {
        let path = self.entry_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PrecacheError::io(format!("removing {}", path.display()), e)),
        }
    }

    async fn entries(&self) -> PrecacheResult<Vec<CachedEntry>> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PrecacheError::io(
                    format!("listing {}", self.dir.display()),
                    e,
                ))
            }
        };

        let mut entries = Vec::new();
        while let Some(file) = dir
            .next_entry()
            .await
            .map_err(|e| PrecacheError::io(format!("listing {}", self.dir.display()), e))?
        {
            let path = file.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(entry) = Self::read_entry(&path).await? {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

fn temp_path(target: &Path) -> PathBuf {
    suffixed(target, "tmp")
}

fn suffixed(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(format!(".{}.{}", Uuid::new_v4(), suffix));
    PathBuf::from(name)
}

/// An entry renamed into place, with the file it displaced
struct Committed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

/// Move a staged file into place, keeping any previous entry aside
async fn commit_one(temp: &Path, target: &Path) -> PrecacheResult<Committed> {
    let backup = match fs::symlink_metadata(target).await {
        Ok(meta) if meta.is_file() => {
            let backup = suffixed(target, "bak");
            fs::rename(target, &backup).await.map_err(|e| {
                PrecacheError::io(format!("replacing {}", target.display()), e)
            })?;
            Some(backup)
        }
        _ => None,
    };

    if let Err(e) = fs::rename(temp, target).await {
        if let Some(backup) = &backup {
            if let Err(e) = fs::rename(backup, target).await {
                warn!("Failed to restore {}: {}", target.display(), e);
            }
        }
        return Err(PrecacheError::io(
            format!("committing {}", target.display()),
            e,
        ));
    }

    Ok(Committed {
        target: target.to_path_buf(),
        backup,
    })
}

/// Undo committed renames in reverse order
async fn roll_back(committed: &[Committed]) {
    for done in committed.iter().rev() {
        let restored = match &done.backup {
            Some(backup) => fs::rename(backup, &done.target).await,
            None => fs::remove_file(&done.target).await,
        };
        if let Err(e) = restored {
            warn!("Failed to roll back {}: {}", done.target.display(), e);
        }
    }
}

async fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (temp, _) in staged {
        if let Err(e) = fs::remove_file(temp).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove staged entry {}: {}", temp.display(), e);
            }
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> PrecacheResult<()> {
    let temp = temp_path(path);
    fs::write(&temp, bytes)
        .await
        .map_err(|e| PrecacheError::io(format!("writing {}", temp.display()), e))?;
    fs::rename(&temp, path)
        .await
        .map_err(|e| PrecacheError::io(format!("committing {}", path.display()), e))
}

fn encode_entry(entry: &CachedEntry) -> PrecacheResult<Vec<u8>> {
    let header = EntryHeader {
        key: entry.key.clone(),
        status: entry.response.status,
        status_text: entry.response.status_text.clone(),
        headers: entry.response.headers.clone(),
        vary: entry.vary.clone(),
        stored_at: entry.stored_at,
    };

    // Compact JSON never contains a raw newline, so it terminates the header
    let mut bytes = serde_json::to_vec(&header)?;
    bytes.push(b'\n');
    bytes.extend_from_slice(&entry.response.body);
    Ok(bytes)
}

fn decode_entry(bytes: &[u8]) -> Result<CachedEntry, String> {
    let split = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| "missing entry header".to_string())?;
    let header: EntryHeader =
        serde_json::from_slice(&bytes[..split]).map_err(|e| e.to_string())?;

    Ok(CachedEntry {
        key: header.key,
        response: Response {
            status: header.status,
            status_text: header.status_text,
            headers: header.headers,
            body: bytes[split + 1..].to_vec(),
        },
        vary: header.vary,
        stored_at: header.stored_at,
    })
}
