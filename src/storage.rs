//! Per-app and per-pane persistent key/value scopes with debounced flush
//! (spec.md §4.6, §6).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::Result;
use crate::pane::PaneId;

#[derive(Debug, Default)]
struct Scope {
    values: HashMap<String, Value>,
    dirty: bool,
}

/// A scoped key/value store rooted at `<base_dir>/storage/`.
pub struct StorageService {
    base_dir: PathBuf,
    scopes: Mutex<HashMap<String, Scope>>,
    flush_debounce: Duration,
    last_write: Mutex<Instant>,
}

impl StorageService {
    pub fn new(base_dir: impl Into<PathBuf>, flush_debounce_ms: u64) -> Self {
        Self {
            base_dir: base_dir.into(),
            scopes: Mutex::new(HashMap::new()),
            flush_debounce: Duration::from_millis(flush_debounce_ms),
            last_write: Mutex::new(Instant::now()),
        }
    }

    pub fn app_scope(app_type: &str) -> String {
        format!("app/{app_type}")
    }

    pub fn pane_scope(pane: PaneId, app_type: &str) -> String {
        format!("pane/{:032x}/{app_type}", pane.0.as_u128())
    }

    fn scope_path(&self, scope: &str) -> PathBuf {
        self.base_dir.join("storage").join(format!("{scope}.json"))
    }

    /// Loads a scope from disk into memory if not already resident. Missing
    /// or corrupt files are treated as an empty scope, never an error.
    fn ensure_loaded(&self, scope: &str) {
        let mut scopes = self.scopes.lock().unwrap();
        if scopes.contains_key(scope) {
            return;
        }
        let path = self.scope_path(scope);
        let values = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<HashMap<String, Value>>(&s).ok())
            .unwrap_or_default();
        scopes.insert(scope.to_string(), Scope { values, dirty: false });
    }

    pub fn get(&self, scope: &str, key: &str) -> Option<Value> {
        self.ensure_loaded(scope);
        self.scopes.lock().unwrap().get(scope)?.values.get(key).cloned()
    }

    pub fn set(&self, scope: &str, key: &str, value: Value) {
        self.ensure_loaded(scope);
        let mut scopes = self.scopes.lock().unwrap();
        let s = scopes.entry(scope.to_string()).or_default();
        s.values.insert(key.to_string(), value);
        s.dirty = true;
        *self.last_write.lock().unwrap() = Instant::now();
    }

    pub fn delete(&self, scope: &str, key: &str) {
        self.ensure_loaded(scope);
        let mut scopes = self.scopes.lock().unwrap();
        if let Some(s) = scopes.get_mut(scope) {
            s.values.remove(key);
            s.dirty = true;
        }
    }

    pub fn list(&self, scope: &str) -> Vec<String> {
        self.ensure_loaded(scope);
        self.scopes
            .lock()
            .unwrap()
            .get(scope)
            .map(|s| s.values.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, scope: &str) {
        self.ensure_loaded(scope);
        let mut scopes = self.scopes.lock().unwrap();
        if let Some(s) = scopes.get_mut(scope) {
            s.values.clear();
            s.dirty = true;
        }
    }

    /// True once `flush_debounce` has elapsed since the last write; callers
    /// (the draw loop's periodic tick) use this to decide whether to flush.
    pub fn debounce_elapsed(&self) -> bool {
        self.last_write.lock().unwrap().elapsed() >= self.flush_debounce
    }

    /// Writes all dirty scopes to disk, atomically per scope file (write to
    /// a temp file, then rename). Clears dirty flags for scopes that
    /// succeeded; scopes that fail to write stay dirty for a later retry.
    pub fn flush(&self) -> Result<()> {
        let mut scopes = self.scopes.lock().unwrap();
        for (name, scope) in scopes.iter_mut() {
            if !scope.dirty {
                continue;
            }
            if write_scope_atomic(&self.scope_path(name), &scope.values).is_ok() {
                scope.dirty = false;
            }
        }
        Ok(())
    }

    /// Cancels any pending debounce and performs a final synchronous flush.
    pub fn close(&self) -> Result<()> {
        self.flush()
    }
}

fn write_scope_atomic(path: &Path, values: &HashMap<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| crate::error::Error::Storage(e.to_string()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_string(values).map_err(|e| crate::error::Error::Storage(e.to_string()))?;
    std::fs::write(&tmp, body).map_err(|e| crate::error::Error::Storage(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| crate::error::Error::Storage(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_scope_file_yields_empty_scope() {
        let dir = std::env::temp_dir().join(format!("paneloom-test-{}", uuid::Uuid::new_v4()));
        let storage = StorageService::new(dir, 2000);
        assert!(storage.get("app/missing", "k").is_none());
        assert!(storage.list("app/missing").is_empty());
    }

    #[test]
    fn set_then_flush_then_fresh_instance_reads_back() {
        let dir = std::env::temp_dir().join(format!("paneloom-test-{}", uuid::Uuid::new_v4()));
        let scope = "app/launcher";
        {
            let storage = StorageService::new(&dir, 2000);
            storage.set(scope, "history", Value::String("ls".into()));
            storage.flush().unwrap();
        }
        let storage2 = StorageService::new(&dir, 2000);
        assert_eq!(storage2.get(scope, "history"), Some(Value::String("ls".into())));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_scope_file_is_treated_as_empty() {
        let dir = std::env::temp_dir().join(format!("paneloom-test-{}", uuid::Uuid::new_v4()));
        let storage = StorageService::new(&dir, 2000);
        let path = storage.scope_path("app/broken");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();
        assert!(storage.get("app/broken", "k").is_none());
        std::fs::remove_dir_all(&dir).ok();
    }
}
