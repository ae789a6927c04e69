//! Persisted activation configuration
//!
//! Each scope may carry an `exm-config.json` recording which extensions are
//! installed and whether each is active. A host reads the first scope that
//! has one (local, then user, then system) and writes back only to its own
//! designated scope — configs never merge across scopes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Filename of the activation config inside a scope directory.
pub const CONFIG_FILENAME: &str = "exm-config.json";

/// One installed-extension entry, keyed by module name in the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExtensionRecord {
    /// Extension id, unique within its namespace.
    #[serde(default)]
    pub id: String,
    /// Namespace the extension belongs to.
    #[serde(default)]
    pub ns: String,
    /// Whether the extension should be loaded by the bulk loader.
    #[serde(default)]
    pub active: bool,
    /// Package-manager-visible module name (`<ns>-ext-<id>`).
    #[serde(default)]
    pub module: String,
}

/// The activation config document.
///
/// Unknown top-level fields are preserved across a load/save round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivationConfig {
    #[serde(default)]
    pub extensions: BTreeMap<String, ExtensionRecord>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Loads, mutates and persists one host's activation config.
#[derive(Debug)]
pub struct ConfigStore {
    config: ActivationConfig,
    path: PathBuf,
    dirty: bool,
}

impl ConfigStore {
    /// Load the config from the first scope directory that has a
    /// syntactically valid JSON object at [`CONFIG_FILENAME`].
    ///
    /// A missing file or invalid JSON is not an error, just "not present at
    /// this scope"; resolution continues down the list. When no scope has a
    /// config, an empty one is produced, anchored at `write_dir` for future
    /// saves. A loaded document missing the `extensions` field gets an empty
    /// mapping injected and the store marked dirty.
    pub fn load(scope_dirs: &[&Path], write_dir: &Path) -> Self {
        for dir in scope_dirs {
            let path = dir.join(CONFIG_FILENAME);
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            let value: serde_json::Value = match serde_json::from_str(&content) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(?path, error = %e, "Skipping config with invalid JSON");
                    continue;
                }
            };
            if !value.is_object() {
                tracing::debug!(?path, "Skipping config that is not a JSON object");
                continue;
            }
            let had_extensions = value.get("extensions").is_some();
            match serde_json::from_value::<ActivationConfig>(value) {
                Ok(config) => {
                    tracing::debug!(?path, "Loaded activation config");
                    return Self {
                        config,
                        path,
                        dirty: !had_extensions,
                    };
                }
                Err(e) => {
                    tracing::debug!(?path, error = %e, "Skipping malformed config");
                    continue;
                }
            }
        }

        Self {
            config: ActivationConfig::default(),
            path: write_dir.join(CONFIG_FILENAME),
            dirty: false,
        }
    }

    /// Write the config back to its own scope's file.
    ///
    /// Failure to write (commonly a permissions issue on the system scope)
    /// is logged and swallowed; losing the ability to persist activation
    /// state must not block the in-memory operation that triggered the save.
    pub fn save(&mut self) {
        let bytes = match serde_json::to_vec_pretty(&self.config) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Failed to serialize activation config");
                return;
            }
        };
        match exm_fs::write_atomic(&self.path, &bytes) {
            Ok(()) => self.dirty = false,
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Failed to persist activation config");
            }
        }
    }

    /// Insert or overwrite the entry for `record.module`.
    pub fn upsert(&mut self, record: ExtensionRecord) {
        self.config
            .extensions
            .insert(record.module.clone(), record);
        self.dirty = true;
    }

    /// Entry for a module name, if recorded.
    pub fn get(&self, module: &str) -> Option<&ExtensionRecord> {
        self.config.extensions.get(module)
    }

    /// All recorded entries, ordered by module name.
    pub fn records(&self) -> impl Iterator<Item = &ExtensionRecord> {
        self.config.extensions.values()
    }

    /// Snapshot of all recorded entries.
    pub fn records_cloned(&self) -> Vec<ExtensionRecord> {
        self.config.extensions.values().cloned().collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The file this store writes back to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(id: &str, ns: &str, active: bool) -> ExtensionRecord {
        ExtensionRecord {
            id: id.to_string(),
            ns: ns.to_string(),
            active,
            module: exm_fs::module_name(ns, id),
        }
    }

    #[test]
    fn test_load_empty_when_no_scope_has_config() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");

        let store = ConfigStore::load(&[&a, &b], &a);
        assert!(store.records().next().is_none());
        assert_eq!(store.path(), a.join(CONFIG_FILENAME));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_first_scope_with_valid_config_wins() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("local");
        let user = temp.path().join("user");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir_all(&user).unwrap();
        fs::write(
            local.join(CONFIG_FILENAME),
            r#"{"extensions":{"demo-ext-a":{"id":"a","ns":"demo","active":true,"module":"demo-ext-a"}}}"#,
        )
        .unwrap();
        fs::write(
            user.join(CONFIG_FILENAME),
            r#"{"extensions":{"demo-ext-b":{"id":"b","ns":"demo","active":true,"module":"demo-ext-b"}}}"#,
        )
        .unwrap();

        let store = ConfigStore::load(&[&local, &user], &local);
        assert!(store.get("demo-ext-a").is_some());
        assert!(store.get("demo-ext-b").is_none());
    }

    #[test]
    fn test_invalid_json_falls_through_to_next_scope() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("local");
        let user = temp.path().join("user");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir_all(&user).unwrap();
        fs::write(local.join(CONFIG_FILENAME), "{not json").unwrap();
        fs::write(
            user.join(CONFIG_FILENAME),
            r#"{"extensions":{"demo-ext-b":{"id":"b","ns":"demo","active":false,"module":"demo-ext-b"}}}"#,
        )
        .unwrap();

        let store = ConfigStore::load(&[&local, &user], &local);
        assert!(store.get("demo-ext-b").is_some());
        // The store writes back to the scope it actually loaded from, so
        // the user-scope file is never cross-written into local.
        assert_eq!(store.path(), user.join(CONFIG_FILENAME));
    }

    #[test]
    fn test_missing_extensions_field_defaults_and_marks_dirty() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("local");
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join(CONFIG_FILENAME), r#"{"version":1}"#).unwrap();

        let store = ConfigStore::load(&[&local], &local);
        assert!(store.records().next().is_none());
        assert!(store.is_dirty());
    }

    #[test]
    fn test_round_trip_preserves_active_flag_and_unknown_fields() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("local");
        fs::create_dir_all(&local).unwrap();
        fs::write(
            local.join(CONFIG_FILENAME),
            r#"{"extensions":{"a":{"active":true}},"custom":"kept"}"#,
        )
        .unwrap();

        let mut store = ConfigStore::load(&[&local], &local);
        assert!(store.get("a").unwrap().active);
        store.save();

        let reloaded = ConfigStore::load(&[&local], &local);
        assert!(reloaded.get("a").unwrap().active);
        assert_eq!(
            reloaded.config().extra.get("custom"),
            Some(&serde_json::Value::String("kept".to_string()))
        );
    }

    #[test]
    fn test_upsert_and_save() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("local");

        let mut store = ConfigStore::load(&[&local], &local);
        store.upsert(record("foo", "demo", true));
        assert!(store.is_dirty());
        store.save();
        assert!(!store.is_dirty());

        let reloaded = ConfigStore::load(&[&local], &local);
        let entry = reloaded.get("demo-ext-foo").unwrap();
        assert_eq!(entry.id, "foo");
        assert_eq!(entry.ns, "demo");
        assert!(entry.active);
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        // A directory at the config path makes the rename fail.
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("local");
        fs::create_dir_all(local.join(CONFIG_FILENAME)).unwrap();

        let mut store = ConfigStore::load(&[&local], &local);
        store.upsert(record("foo", "demo", false));
        store.save();
        // Still dirty, but no panic and no error surfaced.
        assert!(store.is_dirty());
    }

    #[test]
    fn test_upsert_overwrites_existing_entry() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("local");

        let mut store = ConfigStore::load(&[&local], &local);
        store.upsert(record("foo", "demo", false));
        store.upsert(record("foo", "demo", true));

        assert_eq!(store.records().count(), 1);
        assert!(store.get("demo-ext-foo").unwrap().active);
    }
}
