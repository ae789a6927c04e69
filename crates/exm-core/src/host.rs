//! Host — one namespace's view of the extension system
//!
//! A host owns the scoped search directories, the activation config, and the
//! loaded-extension map for a single namespace. Resolution walks the scopes
//! in fixed priority order; install and update delegate to the external
//! package manager at the host's designated write scope.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use exm_fs::{Scope, ScopePaths};

use crate::capability::{CapabilityTable, LazyMap};
use crate::config::{ConfigStore, ExtensionRecord};
use crate::extension::Extension;
use crate::loader::{LoadOutcome, ManifestLoader, ModuleLoader};
use crate::pkg::{NpmPackageManager, OutdatedReport, PackageManager};
use crate::registry::Registry;
use crate::{Error, Result};

/// Options for constructing a [`Host`].
pub struct HostOptions {
    pub namespace: String,
    /// Root directory for the local scope. Defaults to the process-default
    /// root derived from the running executable.
    pub root_dir: Option<PathBuf>,
    /// Home directory override for the user scope. Tests only; the platform
    /// home directory is used when absent.
    pub home_dir: Option<PathBuf>,
    /// Scope that install/update operate on and that config writes target.
    pub write_scope: Scope,
    /// Claim the process's primary-namespace role. At most one host may.
    pub master: bool,
    pub loader: Option<Arc<dyn ModuleLoader>>,
    pub package_manager: Option<Arc<dyn PackageManager>>,
    /// Capabilities the host exposes to its extensions.
    pub exports: Option<CapabilityTable>,
}

impl HostOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            root_dir: None,
            home_dir: None,
            write_scope: Scope::Local,
            master: false,
            loader: None,
            package_manager: None,
            exports: None,
        }
    }

    pub fn root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(dir.into());
        self
    }

    pub fn home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(dir.into());
        self
    }

    pub fn write_scope(mut self, scope: Scope) -> Self {
        self.write_scope = scope;
        self
    }

    pub fn master(mut self) -> Self {
        self.master = true;
        self
    }

    pub fn loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn package_manager(mut self, pkg: Arc<dyn PackageManager>) -> Self {
        self.package_manager = Some(pkg);
        self
    }

    pub fn exports(mut self, exports: CapabilityTable) -> Self {
        self.exports = Some(exports);
        self
    }
}

impl std::fmt::Debug for HostOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostOptions")
            .field("namespace", &self.namespace)
            .field("root_dir", &self.root_dir)
            .field("write_scope", &self.write_scope)
            .field("master", &self.master)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered id → extension map.
#[derive(Default)]
struct LoadedExtensions {
    order: Vec<String>,
    map: HashMap<String, Arc<Extension>>,
}

impl LoadedExtensions {
    fn get(&self, id: &str) -> Option<&Arc<Extension>> {
        self.map.get(id)
    }

    fn insert(&mut self, id: &str, extension: Arc<Extension>) {
        if self.map.insert(id.to_string(), extension).is_none() {
            self.order.push(id.to_string());
        }
    }

    fn in_order(&self) -> Vec<Arc<Extension>> {
        self.order
            .iter()
            .filter_map(|id| self.map.get(id).cloned())
            .collect()
    }
}

/// The runtime object for one namespace.
pub struct Host {
    namespace: String,
    prefix: String,
    root_dir: PathBuf,
    scopes: ScopePaths,
    write_scope: Scope,
    master: bool,
    config: Mutex<ConfigStore>,
    loaded: Mutex<LoadedExtensions>,
    loader: Arc<dyn ModuleLoader>,
    pkg: Arc<dyn PackageManager>,
    exports: CapabilityTable,
    registry: OnceLock<Weak<Registry>>,
}

impl Host {
    /// Build a free-standing host.
    ///
    /// The activation config is loaded here: the first scope with a valid
    /// config wins (local, user, system), and writes are anchored at the
    /// designated write scope. Hosts become registry-owned through
    /// [`Registry::register_namespace`].
    pub fn new(options: HostOptions) -> Result<Self> {
        if options.namespace.is_empty() {
            return Err(Error::MissingRequiredOption {
                option: "namespace",
            });
        }
        let namespace = options.namespace;
        let root_dir = options.root_dir.unwrap_or_else(exm_fs::default_root);
        let scopes = match &options.home_dir {
            Some(home) => ScopePaths::resolve_with_home(&namespace, &root_dir, home),
            None => ScopePaths::resolve(&namespace, &root_dir)?,
        };

        let write_dir = scopes.dir(options.write_scope).to_path_buf();
        let search: Vec<&Path> = scopes
            .in_priority_order()
            .iter()
            .map(|(_, dir)| *dir)
            .collect();
        let config = ConfigStore::load(&search, &write_dir);

        tracing::debug!(
            %namespace,
            root = ?root_dir,
            write_scope = %options.write_scope,
            "Host constructed"
        );

        Ok(Self {
            prefix: format!("{namespace}-ext-"),
            namespace,
            root_dir,
            scopes,
            write_scope: options.write_scope,
            master: options.master,
            config: Mutex::new(config),
            loaded: Mutex::new(LoadedExtensions::default()),
            loader: options
                .loader
                .unwrap_or_else(|| Arc::new(ManifestLoader::new())),
            pkg: options
                .package_manager
                .unwrap_or_else(|| Arc::new(NpmPackageManager::new())),
            exports: options.exports.unwrap_or_else(LazyMap::empty),
            registry: OnceLock::new(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Extension-id prefix, `<namespace>-ext-`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn scopes(&self) -> &ScopePaths {
        &self.scopes
    }

    pub fn write_scope(&self) -> Scope {
        self.write_scope
    }

    pub fn is_master(&self) -> bool {
        self.master
    }

    /// Capabilities this host exposes to its extensions.
    pub fn exports(&self) -> &CapabilityTable {
        &self.exports
    }

    /// Package-manager-visible module name for an extension id in this
    /// host's namespace.
    pub fn module_name(&self, id: &str) -> String {
        exm_fs::module_name(&self.namespace, id)
    }

    /// A loaded extension, if resolution already brought it in.
    pub fn extension(&self, id: &str) -> Option<Arc<Extension>> {
        self.loaded
            .lock()
            .expect("loaded-extension map poisoned")
            .get(id)
            .cloned()
    }

    /// All loaded extensions, in load order.
    pub fn loaded(&self) -> Vec<Arc<Extension>> {
        self.loaded
            .lock()
            .expect("loaded-extension map poisoned")
            .in_order()
    }

    /// Snapshot of the activation config entries.
    pub fn config_records(&self) -> Vec<ExtensionRecord> {
        self.config
            .lock()
            .expect("config store poisoned")
            .records_cloned()
    }

    /// Path of the file the activation config writes back to.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .lock()
            .expect("config store poisoned")
            .path()
            .to_path_buf()
    }

    pub(crate) fn attach(&self, registry: Weak<Registry>) {
        let _ = self.registry.set(registry);
    }

    /// Resolve an extension by id.
    ///
    /// Walks local, then user, then system. Scope priority is purely
    /// positional: a hit at a higher scope always wins, and a shape mismatch
    /// at a higher scope aborts resolution instead of letting a lower scope
    /// shadow the collision. Resolved extensions are initialized once,
    /// recorded process-wide, and memoized per host.
    pub fn require_extension(self: &Arc<Self>, id: &str) -> Result<Arc<Extension>> {
        if id.is_empty() {
            return Err(Error::MissingRequiredOption { option: "id" });
        }
        if let Some(extension) = self.extension(id) {
            return Ok(extension);
        }

        for (scope, dir) in self.scopes.in_priority_order() {
            let path = exm_fs::module_dir(dir, &self.namespace, id);
            match self.loader.load(&path) {
                LoadOutcome::NotFound => continue,
                LoadOutcome::Other { reason } => {
                    return Err(Error::ShapeMismatch { path, reason });
                }
                LoadOutcome::Extension(module) => {
                    if module.id != id {
                        return Err(Error::ShapeMismatch {
                            path,
                            reason: format!(
                                "declared id '{}' does not match requested id '{id}'",
                                module.id
                            ),
                        });
                    }
                    let extension =
                        Extension::new(&self.namespace, id, module.hooks, module.exports)?;
                    let extension = self.register_process_wide(extension)?;
                    extension.init(self);

                    let mut loaded =
                        self.loaded.lock().expect("loaded-extension map poisoned");
                    loaded.insert(id, extension.clone());
                    tracing::debug!(
                        namespace = %self.namespace,
                        %id,
                        %scope,
                        "Extension resolved"
                    );
                    return Ok(extension);
                }
            }
        }

        Err(Error::NotFound {
            id: id.to_string(),
            namespace: self.namespace.clone(),
        })
    }

    /// Record a freshly-loaded extension in the process-wide registry,
    /// enforcing composite-identity uniqueness. A host that was never
    /// registered dedupes only within itself.
    fn register_process_wide(&self, extension: Extension) -> Result<Arc<Extension>> {
        match self.registry.get().and_then(Weak::upgrade) {
            Some(registry) => registry.register_extension(extension),
            None => {
                tracing::debug!(
                    identity = %extension.identity(),
                    "Host not registry-owned; extension recorded locally only"
                );
                Ok(Arc::new(extension))
            }
        }
    }

    /// Install an extension module at the write scope and record it in the
    /// activation config.
    ///
    /// `namespace` lets a master host install another namespace's module;
    /// the module name then uses that namespace's prefix. Package-manager
    /// failures propagate unchanged; a config persistence failure is logged
    /// and does not fail the install.
    pub async fn install_extension(
        &self,
        id: &str,
        activate: bool,
        namespace: Option<&str>,
    ) -> Result<()> {
        if id.is_empty() {
            return Err(Error::MissingRequiredOption { option: "id" });
        }
        let ns = namespace.unwrap_or(&self.namespace);
        let module = exm_fs::module_name(ns, id);
        let dir = self.scopes.dir(self.write_scope);

        exm_fs::ensure_install_layout(dir)?;
        self.pkg.install(&module, dir).await?;

        let mut config = self.config.lock().expect("config store poisoned");
        config.upsert(ExtensionRecord {
            id: id.to_string(),
            ns: ns.to_string(),
            active: activate,
            module: module.clone(),
        });
        config.save();

        tracing::debug!(%module, scope = %self.write_scope, "Extension installed");
        Ok(())
    }

    /// Update every module installed at the write scope.
    pub async fn update_extensions(&self) -> Result<()> {
        let dir = self.scopes.dir(self.write_scope);
        exm_fs::ensure_install_layout(dir)?;
        self.pkg.update(dir).await
    }

    /// Outdated modules at the write scope.
    pub async fn list_outdated_extensions(&self) -> Result<OutdatedReport> {
        self.pkg.list_outdated(self.scopes.dir(self.write_scope)).await
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("namespace", &self.namespace)
            .field("root_dir", &self.root_dir)
            .field("write_scope", &self.write_scope)
            .field("master", &self.master)
            .finish_non_exhaustive()
    }
}
