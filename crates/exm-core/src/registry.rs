//! Process-wide extension registry
//!
//! Namespaces and composite extension identities are deduplicated across the
//! whole process. The registry is an explicit value — tests and embedders
//! construct their own — with a process-lifetime singleton behind
//! [`Registry::global`] for the common case where several independent pieces
//! of one program must agree on the same namespace table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::extension::Extension;
use crate::host::{Host, HostOptions};
use crate::{Error, Result};

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

#[derive(Default)]
struct Inner {
    namespaces: HashMap<String, Arc<Host>>,
    extensions: HashMap<String, Arc<Extension>>,
    master: Option<String>,
}

/// Process-wide namespace and extension tables.
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    /// A fresh, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
        })
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Self> {
        GLOBAL.get_or_init(Self::new).clone()
    }

    /// Construct a host from `options` and take ownership of it.
    ///
    /// Fails when the namespace is empty, already registered, or claims the
    /// master role while another namespace already holds it.
    pub fn register_namespace(self: &Arc<Self>, options: HostOptions) -> Result<Arc<Host>> {
        self.check_registrable(&options.namespace, options.master)?;
        let host = Host::new(options)?;
        self.register_host(host)
    }

    /// Take ownership of a free-standing host.
    pub fn register_host(self: &Arc<Self>, host: Host) -> Result<Arc<Host>> {
        let namespace = host.namespace().to_string();
        let master = host.is_master();

        let host = Arc::new(host);
        host.attach(Arc::downgrade(self));

        let mut inner = self.inner.lock().expect("registry poisoned");
        if inner.namespaces.contains_key(&namespace) {
            return Err(Error::DuplicateNamespace { namespace });
        }
        if master {
            if inner.master.is_some() {
                return Err(Error::MasterAlreadySet { namespace });
            }
            inner.master = Some(namespace.clone());
        }
        tracing::debug!(%namespace, master, "Namespace registered");
        inner.namespaces.insert(namespace, host.clone());
        Ok(host)
    }

    fn check_registrable(&self, namespace: &str, master: bool) -> Result<()> {
        if namespace.is_empty() {
            return Err(Error::MissingRequiredOption {
                option: "namespace",
            });
        }
        let inner = self.inner.lock().expect("registry poisoned");
        if inner.namespaces.contains_key(namespace) {
            return Err(Error::DuplicateNamespace {
                namespace: namespace.to_string(),
            });
        }
        if master && inner.master.is_some() {
            return Err(Error::MasterAlreadySet {
                namespace: namespace.to_string(),
            });
        }
        Ok(())
    }

    /// Record a loaded extension under its composite identity.
    pub fn register_extension(&self, extension: Extension) -> Result<Arc<Extension>> {
        let identity = extension.identity().to_string();
        let mut inner = self.inner.lock().expect("registry poisoned");
        if inner.extensions.contains_key(&identity) {
            return Err(Error::DuplicateExtension { identity });
        }
        let extension = Arc::new(extension);
        tracing::debug!(%identity, "Extension registered");
        inner.extensions.insert(identity, extension.clone());
        Ok(extension)
    }

    /// Host for a namespace, if registered.
    pub fn host(&self, namespace: &str) -> Option<Arc<Host>> {
        self.inner
            .lock()
            .expect("registry poisoned")
            .namespaces
            .get(namespace)
            .cloned()
    }

    /// The master host, if one was registered.
    pub fn master_host(&self) -> Option<Arc<Host>> {
        let inner = self.inner.lock().expect("registry poisoned");
        inner
            .master
            .as_ref()
            .and_then(|ns| inner.namespaces.get(ns))
            .cloned()
    }

    /// Registered namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .lock()
            .expect("registry poisoned")
            .namespaces
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// A registered extension by composite identity.
    pub fn extension(&self, identity: &str) -> Option<Arc<Extension>> {
        self.inner
            .lock()
            .expect("registry poisoned")
            .extensions
            .get(identity)
            .cloned()
    }

    /// Require every active extension recorded in the master host's config
    /// into its target namespace's host.
    ///
    /// Entries for namespaces not registered in this process are logged and
    /// skipped; without a master host this is a no-op.
    pub fn load_active_master_extensions(&self) -> Result<()> {
        let Some(master) = self.master_host() else {
            tracing::debug!("No master namespace registered; nothing to load");
            return Ok(());
        };

        for record in master.config_records() {
            if !record.active {
                continue;
            }
            match self.host(&record.ns) {
                Some(host) => {
                    host.require_extension(&record.id)?;
                }
                None => {
                    tracing::warn!(
                        namespace = %record.ns,
                        id = %record.id,
                        "Skipping active extension for unregistered namespace"
                    );
                }
            }
        }
        Ok(())
    }

    /// Re-run the install operation for every extension recorded in the
    /// master host's config, regardless of its active flag.
    pub async fn install_master_modules(&self) -> Result<()> {
        let Some(master) = self.master_host() else {
            tracing::debug!("No master namespace registered; nothing to install");
            return Ok(());
        };

        for record in master.config_records() {
            master
                .install_extension(&record.id, record.active, Some(&record.ns))
                .await?;
        }
        Ok(())
    }
}
