//! End-to-end tests for the extension system
//!
//! These exercise the complete flow — namespace registration, install via a
//! stubbed package manager, activation-config persistence, and scope-walking
//! resolution — across crate boundaries, with all directories confined to a
//! sandbox.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use exm_core::{
    CONFIG_FILENAME, Error, HostOptions, MANIFEST_FILENAME, OutdatedReport, PackageManager,
    Registry, Result,
};
use exm_fs::Scope;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

/// Package-manager stub that records invocations and materializes the
/// installed module the way npm would: a module directory under
/// `node_modules` carrying an extension manifest.
#[derive(Default)]
struct FakeNpm {
    installs: Mutex<Vec<(String, PathBuf)>>,
}

#[async_trait]
impl PackageManager for FakeNpm {
    async fn install(&self, module_name: &str, cwd: &Path) -> Result<()> {
        let dir = cwd.join("node_modules").join(module_name);
        fs::create_dir_all(&dir).unwrap();
        let id = module_name
            .split("-ext-")
            .nth(1)
            .expect("module name carries the -ext- infix");
        fs::write(
            dir.join(MANIFEST_FILENAME),
            format!(r#"{{"exm":true,"id":"{id}","exports":{{"kind":"stub"}}}}"#),
        )
        .unwrap();

        self.installs
            .lock()
            .unwrap()
            .push((module_name.to_string(), cwd.to_path_buf()));
        Ok(())
    }

    async fn update(&self, _cwd: &Path) -> Result<()> {
        Ok(())
    }

    async fn list_outdated(&self, _cwd: &Path) -> Result<OutdatedReport> {
        Ok(OutdatedReport::default())
    }
}

struct Sandbox {
    _temp: TempDir,
    root: PathBuf,
    home: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let home = temp.path().join("home");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&home).unwrap();
        Self {
            _temp: temp,
            root,
            home,
        }
    }

    fn options(&self, namespace: &str, pm: &Arc<FakeNpm>) -> HostOptions {
        HostOptions::new(namespace)
            .root_dir(&self.root)
            .home_dir(&self.home)
            .package_manager(pm.clone())
    }

    fn local_dir(&self) -> PathBuf {
        self.root.join("extensions")
    }

    fn user_dir(&self, namespace: &str) -> PathBuf {
        self.home
            .join(".local/share")
            .join(namespace)
            .join("extensions")
    }

    fn write_module(&self, scope_dir: &Path, ns: &str, id: &str) {
        let dir = scope_dir
            .join("node_modules")
            .join(exm_fs::module_name(ns, id));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILENAME),
            format!(r#"{{"exm":true,"id":"{id}"}}"#),
        )
        .unwrap();
    }
}

#[tokio::test]
async fn test_install_then_require_end_to_end() {
    let sandbox = Sandbox::new();
    let pm = Arc::new(FakeNpm::default());
    let registry = Registry::new();
    let host = registry
        .register_namespace(sandbox.options("demo", &pm))
        .unwrap();

    // Fresh namespace: no directories exist yet.
    host.install_extension("foo", true, None).await.unwrap();

    // Directory layout was bootstrapped, never clobbering markers.
    let local = sandbox.local_dir();
    assert!(local.join("node_modules").is_dir());
    assert_eq!(fs::read_to_string(local.join("package.json")).unwrap(), "{}");
    assert_eq!(fs::read_to_string(local.join("exm.json")).unwrap(), "{}");

    // The package manager ran for the namespaced module name.
    assert_eq!(
        pm.installs.lock().unwrap().as_slice(),
        &[("demo-ext-foo".to_string(), local.clone())]
    );

    // The activation config was persisted with the requested flag.
    let config: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(local.join(CONFIG_FILENAME)).unwrap()).unwrap();
    assert_eq!(config["extensions"]["demo-ext-foo"]["active"], true);

    // Resolution finds the module at local scope and memoizes it.
    let ext = host.require_extension("foo").unwrap();
    assert_eq!(ext.identity(), "demo.foo");
    assert!(ext.is_initialized());
    let again = host.require_extension("foo").unwrap();
    assert!(Arc::ptr_eq(&ext, &again));

    // And it landed in the process-wide table.
    assert!(registry.extension("demo.foo").is_some());
}

#[test]
fn test_user_scope_resolution_without_local() {
    let sandbox = Sandbox::new();
    let pm = Arc::new(FakeNpm::default());
    let registry = Registry::new();
    let host = registry
        .register_namespace(sandbox.options("demo", &pm))
        .unwrap();

    sandbox.write_module(&sandbox.user_dir("demo"), "demo", "foo");

    let ext = host.require_extension("foo").unwrap();
    assert_eq!(ext.identity(), "demo.foo");
}

#[test]
fn test_local_name_collision_blocks_user_scope() {
    let sandbox = Sandbox::new();
    let pm = Arc::new(FakeNpm::default());
    let registry = Registry::new();
    let host = registry
        .register_namespace(sandbox.options("demo", &pm))
        .unwrap();

    // An unrelated package occupies the local module path.
    let squatter = sandbox
        .local_dir()
        .join("node_modules")
        .join("demo-ext-foo");
    fs::create_dir_all(&squatter).unwrap();
    fs::write(squatter.join(MANIFEST_FILENAME), r#"{"name":"imposter"}"#).unwrap();
    // A valid module sits at user scope.
    sandbox.write_module(&sandbox.user_dir("demo"), "demo", "foo");

    let err = host.require_extension("foo").unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    assert!(host.extension("foo").is_none());
}

#[tokio::test]
async fn test_config_survives_process_restart() {
    let sandbox = Sandbox::new();
    let pm = Arc::new(FakeNpm::default());

    {
        let registry = Registry::new();
        let host = registry
            .register_namespace(sandbox.options("demo", &pm))
            .unwrap();
        host.install_extension("foo", true, None).await.unwrap();
        host.install_extension("bar", false, None).await.unwrap();
    }

    // A new registry and host simulate a fresh process over the same dirs.
    let registry = Registry::new();
    let host = registry
        .register_namespace(sandbox.options("demo", &pm))
        .unwrap();
    let records = host.config_records();
    assert_eq!(records.len(), 2);
    let foo = records.iter().find(|r| r.id == "foo").unwrap();
    assert!(foo.active);
    let bar = records.iter().find(|r| r.id == "bar").unwrap();
    assert!(!bar.active);
}

#[tokio::test]
async fn test_unwritable_config_does_not_block_install() {
    let sandbox = Sandbox::new();
    let pm = Arc::new(FakeNpm::default());
    // Occupy the config path with a directory so persistence always fails.
    fs::create_dir_all(sandbox.local_dir().join(CONFIG_FILENAME)).unwrap();

    let registry = Registry::new();
    let host = registry
        .register_namespace(sandbox.options("demo", &pm))
        .unwrap();

    host.install_extension("foo", true, None).await.unwrap();
    assert_eq!(pm.installs.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_master_driven_bulk_operations() {
    let sandbox = Sandbox::new();
    let pm = Arc::new(FakeNpm::default());
    let registry = Registry::new();

    let master = registry
        .register_namespace(sandbox.options("hub", &pm).master())
        .unwrap();
    assert!(Arc::ptr_eq(&registry.master_host().unwrap(), &master));

    // Record extensions for two namespaces; one namespace never registers.
    master.install_extension("on", true, Some("demo")).await.unwrap();
    master.install_extension("off", false, Some("demo")).await.unwrap();
    master.install_extension("x", true, Some("gone")).await.unwrap();

    // The demo host shares the hub's root, so it sees the installed modules.
    let demo = registry
        .register_namespace(sandbox.options("demo", &pm))
        .unwrap();

    registry.load_active_master_extensions().unwrap();

    // Only the active demo entry was loaded; the inactive one was skipped
    // and the unregistered namespace was logged, not fatal.
    assert!(demo.extension("on").is_some());
    assert!(demo.extension("off").is_none());
    assert!(registry.extension("demo.on").is_some());
    assert!(registry.extension("gone.x").is_none());

    // install_master_modules re-runs every install, active or not.
    pm.installs.lock().unwrap().clear();
    registry.install_master_modules().await.unwrap();
    let mut installed: Vec<String> = pm
        .installs
        .lock()
        .unwrap()
        .iter()
        .map(|(m, _)| m.clone())
        .collect();
    installed.sort();
    assert_eq!(installed, vec!["demo-ext-off", "demo-ext-on", "gone-ext-x"]);
}

#[tokio::test]
async fn test_user_write_scope_keeps_local_untouched() {
    let sandbox = Sandbox::new();
    let pm = Arc::new(FakeNpm::default());
    let registry = Registry::new();
    let host = registry
        .register_namespace(
            sandbox
                .options("demo", &pm)
                .write_scope(Scope::User),
        )
        .unwrap();

    host.install_extension("foo", true, None).await.unwrap();

    assert!(!sandbox.local_dir().exists());
    let user = sandbox.user_dir("demo");
    assert!(user.join("node_modules").is_dir());
    assert!(user.join(CONFIG_FILENAME).is_file());

    // Resolution still finds it through the scope walk.
    let ext = host.require_extension("foo").unwrap();
    assert_eq!(ext.id(), "foo");
}

#[test]
fn test_duplicate_namespace_across_hosts() {
    let sandbox = Sandbox::new();
    let pm = Arc::new(FakeNpm::default());
    let registry = Registry::new();

    registry
        .register_namespace(sandbox.options("demo", &pm))
        .unwrap();
    let err = registry
        .register_namespace(sandbox.options("demo", &pm))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateNamespace { .. }));
}
