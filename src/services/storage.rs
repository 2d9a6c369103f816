use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{error, info, warn};

/// A persisted document. `VERSION` is written next to the data and newer
/// versions than the one compiled in are refused on load.
pub trait Document: Serialize + DeserializeOwned + Default + Send {
    const VERSION: u32;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    version: u32,
    data: T,
}

/// A JSON file holding one document, kept in memory behind a mutex.
pub struct JsonStore<T: Document> {
    path: PathBuf,
    state: Mutex<T>,
}

impl<T: Document> JsonStore<T> {
    /// Loads the document at `path`. A missing file yields the default
    /// document; an unreadable one is moved aside and replaced.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(raw) => match parse::<T>(&raw) {
                Ok(document) => {
                    info!("Loaded {}", path.display());
                    document
                }
                Err(reason) => {
                    error!("Invalid data in {}: {}", path.display(), reason);
                    quarantine(&path);
                    T::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => T::default(),
            Err(e) => {
                error!("Failed to read {}: {:?}", path.display(), e);
                T::default()
            }
        };

        Self {
            path,
            state: Mutex::new(document),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Mutates the document and writes it back. A failed write is logged;
    /// the in-memory change is kept either way.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut guard);
        if let Err(e) = write_atomic(&self.path, &*guard) {
            error!("{}", e);
        }
        result
    }
}

fn parse<T: Document>(raw: &str) -> Result<T, String> {
    let envelope: Envelope<T> = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    if envelope.version > T::VERSION {
        return Err(format!(
            "unsupported version {} (expected at most {})",
            envelope.version,
            T::VERSION
        ));
    }
    Ok(envelope.data)
}

fn quarantine(path: &Path) {
    let mut backup = path.as_os_str().to_owned();
    backup.push(format!(".backup.{}", chrono::Utc::now().timestamp()));
    match fs::rename(path, &backup) {
        Ok(()) => warn!("Moved {} aside to {:?}", path.display(), backup),
        Err(e) => error!("Failed to move {} aside: {:?}", path.display(), e),
    }
}

fn write_atomic<T: Document>(path: &Path, document: &T) -> Result<(), StoreError> {
    let body = serde_json::to_string_pretty(&EnvelopeRef {
        version: T::VERSION,
        data: document,
    })
    .map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Err(source) = fs::write(&tmp, body).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(source));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counters {
        #[serde(default)]
        by_user: HashMap<u64, u64>,
    }

    impl Document for Counters {
        const VERSION: u32 = 2;
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::<Counters>::load(dir.path().join("nope.json"));
        assert_eq!(store.read(|c| c.by_user.len()), 0);
    }

    #[test]
    fn update_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("counters.json");

        let store = JsonStore::<Counters>::load(&path);
        store.update(|c| c.by_user.insert(42, 7));
        drop(store);

        let reloaded = JsonStore::<Counters>::load(&path);
        assert_eq!(reloaded.read(|c| c.by_user.get(&42).copied()), Some(7));
        assert!(!dir.path().join("nested").join("counters.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonStore::<Counters>::load(&path);
        assert!(store.read(|c| c.by_user.is_empty()));
        assert!(!path.exists());

        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("counters.json.backup."))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn newer_version_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.json");
        fs::write(&path, r#"{"version": 9, "data": {"by_user": {"1": 1}}}"#).unwrap();

        let store = JsonStore::<Counters>::load(&path);
        assert!(store.read(|c| c.by_user.is_empty()));
    }

    #[test]
    fn string_keys_round_trip_as_ids() {
        let parsed = parse::<Counters>(r#"{"version": 1, "data": {"by_user": {"123": 4}}}"#).unwrap();
        assert_eq!(parsed.by_user.get(&123), Some(&4));
    }
}
