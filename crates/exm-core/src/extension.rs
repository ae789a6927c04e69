//! Loaded extension instances

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::capability::CapabilityTable;
use crate::host::Host;
use crate::{Error, Result};

/// Lifecycle hook functions an extension module may carry.
///
/// `init` runs once, after the extension has been bound to its host.
pub struct Hooks {
    pub init: Option<Box<dyn Fn(&Arc<Host>) + Send + Sync>>,
}

impl Hooks {
    /// No lifecycle hooks.
    pub fn none() -> Self {
        Self { init: None }
    }

    /// Hooks with an init function.
    pub fn on_init(f: impl Fn(&Arc<Host>) + Send + Sync + 'static) -> Self {
        Self {
            init: Some(Box::new(f)),
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("init", &self.init.is_some())
            .finish()
    }
}

/// A loaded plugin instance.
///
/// Created once per process per composite identity (`<namespace>.<id>`);
/// re-registration under the same identity is a configuration error enforced
/// by the registry. Initialization is idempotent: the init hook runs exactly
/// once across any number of [`Extension::init`] calls.
pub struct Extension {
    namespace: String,
    id: String,
    identity: String,
    hooks: Hooks,
    exports: CapabilityTable,
    initialized: AtomicBool,
    host: OnceLock<Weak<Host>>,
}

impl Extension {
    /// Build an extension instance. Fails when the id or namespace is empty.
    pub fn new(
        namespace: impl Into<String>,
        id: impl Into<String>,
        hooks: Hooks,
        exports: CapabilityTable,
    ) -> Result<Self> {
        let namespace = namespace.into();
        let id = id.into();
        if namespace.is_empty() {
            return Err(Error::MissingRequiredOption {
                option: "namespace",
            });
        }
        if id.is_empty() {
            return Err(Error::MissingRequiredOption { option: "id" });
        }
        let identity = format!("{namespace}.{id}");
        Ok(Self {
            namespace,
            id,
            identity,
            hooks,
            exports,
            initialized: AtomicBool::new(false),
            host: OnceLock::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Process-unique composite identity, `<namespace>.<id>`.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Capabilities this extension exposes to its host.
    pub fn exports(&self) -> &CapabilityTable {
        &self.exports
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Bind the extension to its hosting [`Host`] and run the init hook.
    ///
    /// The second and later calls are no-ops.
    pub fn init(&self, host: &Arc<Host>) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.host.set(Arc::downgrade(host));
        if let Some(hook) = &self.hooks.init {
            hook(host);
        }
        tracing::debug!(identity = %self.identity, "Extension initialized");
    }

    /// The hosting Host. Absent until [`Extension::init`] has run.
    pub fn host(&self) -> Option<Arc<Host>> {
        self.host.get().and_then(Weak::upgrade)
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("identity", &self.identity)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
