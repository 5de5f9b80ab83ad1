use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::domain::JTError;

pub const APPLIED_KEY: &str = "applied_jobs";
pub const HIDE_APPLIED_KEY: &str = "hide_applied";

/// Minimal key-value persistence capability.
pub trait KeyValueStore {
    /// `Ok(None)` when nothing was stored under `key` yet.
    fn read(&self, key: &str) -> Result<Option<String>, JTError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), JTError>;
}

/// One JSON document per key inside a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: &Path) -> Result<Self, JTError> {
        fs::create_dir_all(dir)?;
        debug!("Using state directory {:?}", dir);
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, JTError> {
        match fs::read_to_string(self.path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), JTError> {
        // Write next to the target and rename, readers never see half a file.
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.path(key)).map_err(|e| e.error)?;
        trace!("Persisted {key} ({} bytes)", value.len());
        Ok(())
    }
}

/// In-process store. Clones share the same entries, which lets a test drop
/// the application state and "reload" from the same persisted data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, JTError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), JTError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The state directory when it is usable, otherwise entries only live for
/// this session.
#[derive(Debug, Clone)]
pub enum StateStore {
    Files(FileStore),
    Memory(MemoryStore),
}

impl StateStore {
    pub fn open(dir: &Path) -> Self {
        match FileStore::open(dir) {
            Ok(store) => StateStore::Files(store),
            Err(e) => {
                warn!(
                    "State directory {:?} is not usable, keeping state in memory: {e:?}",
                    dir
                );
                StateStore::Memory(MemoryStore::new())
            }
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, StateStore::Files(_))
    }
}

impl KeyValueStore for StateStore {
    fn read(&self, key: &str) -> Result<Option<String>, JTError> {
        match self {
            StateStore::Files(store) => store.read(key),
            StateStore::Memory(store) => store.read(key),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), JTError> {
        match self {
            StateStore::Files(store) => store.write(key, value),
            StateStore::Memory(store) => store.write(key, value),
        }
    }
}

// Missing or unreadable values are treated as "nothing stored".
fn read_json<T: serde::de::DeserializeOwned>(backend: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match backend.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Reading {key} failed, starting empty: {e:?}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Stored {key} is not valid, starting empty: {e:?}");
            None
        }
    }
}

/// Persistent "applied" flag per job link.
pub struct AppliedStore {
    backend: Box<dyn KeyValueStore>,
    applied: HashMap<String, bool>,
}

impl AppliedStore {
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            applied: HashMap::new(),
        }
    }

    /// Replace the in-memory map with the persisted one.
    pub fn load_all(&mut self) -> &HashMap<String, bool> {
        self.applied = read_json(self.backend.as_ref(), APPLIED_KEY).unwrap_or_default();
        debug!("Loaded {} applied states", self.applied.len());
        &self.applied
    }

    pub fn get(&self, link: &str) -> bool {
        self.applied.get(link).copied().unwrap_or(false)
    }

    /// Persist the whole map with `link` updated. The in-memory map only
    /// changes once the write succeeded, so both always agree.
    pub fn set(&mut self, link: &str, applied: bool) -> Result<(), JTError> {
        let mut next = self.applied.clone();
        next.insert(link.to_string(), applied);
        let serialized = serde_json::to_string(&next)?;
        self.backend.write(APPLIED_KEY, &serialized)?;
        self.applied = next;
        debug!("Set applied={applied} for {link}");
        Ok(())
    }

    /// Invert the flag of `link` and return the new value.
    pub fn toggle(&mut self, link: &str) -> Result<bool, JTError> {
        let applied = !self.get(link);
        self.set(link, applied)?;
        Ok(applied)
    }

    pub fn entries(&self) -> &HashMap<String, bool> {
        &self.applied
    }
}

/// View preferences that survive a restart.
pub struct Preferences {
    backend: Box<dyn KeyValueStore>,
    hide_applied: bool,
}

impl Preferences {
    pub fn load(backend: Box<dyn KeyValueStore>) -> Self {
        let hide_applied = read_json(backend.as_ref(), HIDE_APPLIED_KEY).unwrap_or(false);
        Self {
            backend,
            hide_applied,
        }
    }

    pub fn hide_applied(&self) -> bool {
        self.hide_applied
    }

    pub fn set_hide_applied(&mut self, hide: bool) -> Result<(), JTError> {
        self.backend
            .write(HIDE_APPLIED_KEY, &serde_json::to_string(&hide)?)?;
        self.hide_applied = hide;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn read(&self, _key: &str) -> Result<Option<String>, JTError> {
            Err(JTError::PermissionDenied)
        }

        fn write(&mut self, _key: &str, _value: &str) -> Result<(), JTError> {
            Err(JTError::PermissionDenied)
        }
    }

    fn stored_map(store: &MemoryStore) -> HashMap<String, bool> {
        let raw = store.read(APPLIED_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn absent_links_are_not_applied() {
        let mut store = AppliedStore::new(Box::new(MemoryStore::new()));
        assert!(store.load_all().is_empty());
        assert!(!store.get("http://a"));
    }

    #[test]
    fn toggle_twice_restores_and_persists() {
        let backend = MemoryStore::new();
        let mut store = AppliedStore::new(Box::new(backend.clone()));
        store.load_all();

        assert!(store.toggle("http://a").unwrap());
        assert!(store.get("http://a"));
        assert_eq!(&stored_map(&backend), store.entries());

        assert!(!store.toggle("http://a").unwrap());
        assert!(!store.get("http://a"));
        assert_eq!(&stored_map(&backend), store.entries());
    }

    #[test]
    fn entries_are_never_pruned() {
        let backend = MemoryStore::new();
        let mut store = AppliedStore::new(Box::new(backend.clone()));
        store.set("http://a", true).unwrap();
        store.set("http://a", false).unwrap();
        assert_eq!(stored_map(&backend).get("http://a"), Some(&false));
    }

    #[test]
    fn reload_sees_persisted_state() {
        let backend = MemoryStore::new();
        let mut first = AppliedStore::new(Box::new(backend.clone()));
        first.set("http://a", true).unwrap();

        let mut second = AppliedStore::new(Box::new(backend));
        assert!(!second.get("http://a"));
        second.load_all();
        assert!(second.get("http://a"));
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let mut store = AppliedStore::new(Box::new(ReadOnlyStore));
        assert!(store.load_all().is_empty());
        assert!(store.set("http://a", true).is_err());
        assert!(!store.get("http://a"));
    }

    #[test]
    fn corrupt_state_is_empty_state() {
        let mut backend = MemoryStore::new();
        backend.write(APPLIED_KEY, "{broken").unwrap();
        backend.write(HIDE_APPLIED_KEY, "\"yes\"").unwrap();

        let mut store = AppliedStore::new(Box::new(backend.clone()));
        assert!(store.load_all().is_empty());
        assert!(!Preferences::load(Box::new(backend)).hide_applied());
    }

    #[test]
    fn hide_applied_round_trips() {
        let backend = MemoryStore::new();
        let mut prefs = Preferences::load(Box::new(backend.clone()));
        assert!(!prefs.hide_applied());
        prefs.set_hide_applied(true).unwrap();
        assert!(Preferences::load(Box::new(backend)).hide_applied());
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(&dir.path().join("state")).unwrap();
        assert_eq!(store.read(APPLIED_KEY).unwrap(), None);

        store.write(APPLIED_KEY, r#"{"http://a":true}"#).unwrap();
        store.write(APPLIED_KEY, r#"{"http://b":true}"#).unwrap();
        assert_eq!(
            store.read(APPLIED_KEY).unwrap().as_deref(),
            Some(r#"{"http://b":true}"#)
        );
        assert!(dir.path().join("state").join("applied_jobs.json").is_file());
    }

    #[test]
    fn unusable_state_dir_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("afile");
        fs::write(&not_a_dir, "").unwrap();

        let mut store = StateStore::open(&not_a_dir.join("state"));
        assert!(!store.is_persistent());
        assert_eq!(store.read(APPLIED_KEY).unwrap(), None);
        store.write(APPLIED_KEY, r#"{"http://a":true}"#).unwrap();

        let mut applied = AppliedStore::new(Box::new(store.clone()));
        assert!(applied.load_all().get("http://a").copied().unwrap_or(false));

        assert!(StateStore::open(&dir.path().join("state")).is_persistent());
    }

    #[test]
    fn applied_store_over_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let mut applied = AppliedStore::new(Box::new(store.clone()));
        applied.load_all();
        applied.set("http://a", true).unwrap();

        let mut reloaded = AppliedStore::new(Box::new(store));
        assert!(reloaded.load_all().get("http://a").copied().unwrap_or(false));
    }
}
