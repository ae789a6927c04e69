//! Module loader boundary
//!
//! Materializing a scope path into a usable module value belongs to the
//! surrounding runtime; this module only fixes the contract. A loader
//! reports one of three outcomes: a validated extension module, "something
//! else lives here" (a fatal name collision at the call site), or nothing at
//! all (resolution continues to the next scope).

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::capability::{Capability, CapabilityTable, LazyMap};
use crate::extension::Hooks;

/// Filename that identifies a module directory as an exm extension.
pub const MANIFEST_FILENAME: &str = "exm-extension.json";

/// The raw module value a loader produced, before host binding.
pub struct ExtensionModule {
    /// Id the module declares for itself. Must match the requested id.
    pub id: String,
    /// Lifecycle hooks.
    pub hooks: Hooks,
    /// Capabilities the module exposes to its host.
    pub exports: CapabilityTable,
}

impl std::fmt::Debug for ExtensionModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionModule")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Outcome of attempting to load a module at one scope path.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The path holds a module carrying the extension identity tag.
    Extension(ExtensionModule),
    /// The path holds some unrelated module. Fatal to the resolution,
    /// never "try the next scope".
    Other { reason: String },
    /// Nothing loadable at this path.
    NotFound,
}

/// Materializes a file path into a module value.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, path: &Path) -> LoadOutcome;
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    exm: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    exports: serde_json::Map<String, serde_json::Value>,
}

/// Default loader: a module directory is an extension iff it carries an
/// `exm-extension.json` manifest with the `"exm": true` identity tag.
///
/// Manifest `exports` entries become lazily-materialized JSON-value
/// capabilities. An absent directory, absent manifest, or unreadable or
/// unparsable manifest file means nothing was materialized at this path.
#[derive(Debug, Default, Clone)]
pub struct ManifestLoader;

impl ManifestLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for ManifestLoader {
    fn load(&self, path: &Path) -> LoadOutcome {
        let manifest_path = path.join(MANIFEST_FILENAME);
        let Ok(content) = fs::read_to_string(&manifest_path) else {
            return LoadOutcome::NotFound;
        };
        let manifest: Manifest = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(path = ?manifest_path, error = %e, "Unparsable manifest");
                return LoadOutcome::NotFound;
            }
        };

        if !manifest.exm {
            return LoadOutcome::Other {
                reason: "missing 'exm' identity tag".to_string(),
            };
        }
        let Some(id) = manifest.id.filter(|id| !id.is_empty()) else {
            return LoadOutcome::Other {
                reason: "manifest missing 'id'".to_string(),
            };
        };

        let declarations: Vec<String> = manifest.exports.keys().cloned().collect();
        let values = manifest.exports;
        let exports = LazyMap::bind(
            declarations,
            Box::new(move |name| {
                values
                    .get(name)
                    .map(|v| Arc::new(v.clone()) as Capability)
            }),
        );

        LoadOutcome::Extension(ExtensionModule {
            id,
            hooks: Hooks::none(),
            exports,
        })
    }
}
