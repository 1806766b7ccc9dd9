use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::Builder;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StateError;
use crate::storage_traits::{ImageState, StateResult, StateStore};

type Mapping = BTreeMap<String, ImageState>;

/// File-backed state store: one pretty-printed JSON object mapping canonical
/// image reference → `{"last_pushed": ...}`.
///
/// Every `save` is a full read-modify-write of the document. The new document
/// is written to a temp file in the same directory and renamed over the
/// target, so readers only ever see the previous or the new complete mapping.
pub struct JsonStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self, key: &str) -> StateResult<Option<ImageState>> {
        let path = self.path.clone();
        let mapping = tokio::task::spawn_blocking(move || read_mapping(&path)).await??;
        Ok(mapping.get(key).copied())
    }

    async fn save(&self, key: &str, state: ImageState) -> StateResult<()> {
        let _guard = self.write_lock.lock().await;

        let path = self.path.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let mut mapping = read_mapping(&path)?;
            mapping.insert(key, state);
            write_mapping(&path, &mapping)?;
            debug!(path = %path.display(), entries = mapping.len(), "state file written");
            Ok::<(), StateError>(())
        })
        .await?
    }
}

/// Read the whole mapping. A missing file is an empty mapping.
fn read_mapping(path: &Path) -> StateResult<Mapping> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StateError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Mapping::new()),
        Err(e) => Err(StateError::io(path, e)),
    }
}

/// Mode for the new document: the existing file's, or 0644 for a new file.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Some(meta.permissions()),
        _ => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Flush the rename itself by syncing the containing directory.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> StateResult<()> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| StateError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> StateResult<()> {
    Ok(())
}

/// Atomic write: temp file in the target's directory, then rename into place.
/// An unpersisted temp file is removed when dropped. The target keeps its
/// permissions across the rename.
fn write_mapping(path: &Path, mapping: &Mapping) -> StateResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| StateError::io(&dir, e))?;

    let data = serde_json::to_vec_pretty(mapping)?;

    let prefix = format!(
        ".{}.",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string())
    );
    let mut tmp = Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(|e| StateError::io(&dir, e))?;
    if let Some(perms) = target_permissions(path) {
        tmp.as_file()
            .set_permissions(perms)
            .map_err(|e| StateError::io(tmp.path(), e))?;
    }
    tmp.write_all(&data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| StateError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StateError::io(path, e.error))?;

    sync_dir(&dir)
}
