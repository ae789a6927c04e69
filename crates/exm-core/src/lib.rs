//! Namespaced extension registry and resolution for exm.
//!
//! Each host application in a process owns a namespace and searches three
//! scoped directories (local, user, system) for extension modules. This
//! crate provides the activation config store, the process-wide registry
//! that deduplicates namespaces and loaded extensions, the lazy capability
//! tables exchanged between hosts and extensions, and the collaborator
//! boundaries to the module loader and the external package manager.

pub mod capability;
pub mod config;
pub mod error;
pub mod extension;
pub mod host;
pub mod loader;
pub mod pkg;
pub mod registry;

pub use capability::{Capability, CapabilityTable, LazyMap};
pub use config::{ActivationConfig, CONFIG_FILENAME, ConfigStore, ExtensionRecord};
pub use error::{Error, Result};
pub use extension::{Extension, Hooks};
pub use host::{Host, HostOptions};
pub use loader::{ExtensionModule, LoadOutcome, MANIFEST_FILENAME, ManifestLoader, ModuleLoader};
pub use pkg::{NpmPackageManager, OutdatedPackage, OutdatedReport, PackageManager};
pub use registry::Registry;
