//! Scoped extension directory resolution
//!
//! Every namespace searches three fixed locations for extension modules,
//! always in the same priority order: local, then user, then system.

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Directory name holding package-manager-installed modules inside a scope.
pub const MODULE_SUBDIR: &str = "node_modules";

/// Marker file that delimits a package boundary when walking for a root.
pub const BOUNDARY_MARKER: &str = "package.json";

/// One of the three fixed extension-search locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// `<root>/extensions` — per-application install.
    Local,
    /// `<home>/.local/share/<namespace>/extensions` — per-user install.
    User,
    /// `/usr/share/<namespace>/extensions` — machine-wide install.
    System,
}

impl Scope {
    /// Fixed resolution priority. Purely positional, never content-based.
    pub const PRIORITY: [Scope; 3] = [Scope::Local, Scope::User, Scope::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::User => "user",
            Scope::System => "system",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Scope::Local),
            "user" => Ok(Scope::User),
            "system" => Ok(Scope::System),
            other => Err(format!("unknown scope '{other}' (expected local, user or system)")),
        }
    }
}

/// The three resolved scope directories for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePaths {
    pub local: PathBuf,
    pub user: PathBuf,
    pub system: PathBuf,
}

impl ScopePaths {
    /// Resolve the scope directories for `namespace` anchored at `root_dir`.
    ///
    /// The user scope is derived from the platform home directory via
    /// [`dirs::home_dir`].
    pub fn resolve(namespace: &str, root_dir: &Path) -> Result<Self> {
        let home = dirs::home_dir().ok_or(Error::NoHomeDir)?;
        Ok(Self::resolve_with_home(namespace, root_dir, &home))
    }

    /// Resolve with an explicit home directory.
    ///
    /// Primarily useful for tests, where the real user scope must not be
    /// touched.
    pub fn resolve_with_home(namespace: &str, root_dir: &Path, home: &Path) -> Self {
        Self {
            local: root_dir.join("extensions"),
            user: home
                .join(".local")
                .join("share")
                .join(namespace)
                .join("extensions"),
            system: PathBuf::from("/usr")
                .join("share")
                .join(namespace)
                .join("extensions"),
        }
    }

    /// Directory for one scope.
    pub fn dir(&self, scope: Scope) -> &Path {
        match scope {
            Scope::Local => &self.local,
            Scope::User => &self.user,
            Scope::System => &self.system,
        }
    }

    /// The scope directories in resolution priority order.
    pub fn in_priority_order(&self) -> [(Scope, &Path); 3] {
        [
            (Scope::Local, self.local.as_path()),
            (Scope::User, self.user.as_path()),
            (Scope::System, self.system.as_path()),
        ]
    }
}

/// Package-manager-visible module name for an extension id.
///
/// `module_name("demo", "foo")` is `"demo-ext-foo"`.
pub fn module_name(namespace: &str, id: &str) -> String {
    format!("{namespace}-ext-{id}")
}

/// Where the package manager installs an extension module within a scope.
pub fn module_dir(scope_dir: &Path, namespace: &str, id: &str) -> PathBuf {
    scope_dir.join(MODULE_SUBDIR).join(module_name(namespace, id))
}

/// Walk upward from `start` and return the outermost ancestor directory for
/// which `probe(<ancestor>/<marker>)` reports true.
///
/// The walk visits `start` itself first, then each parent, and terminates at
/// the filesystem root. Returns `None` when no ancestor carries the marker.
/// The probe is injected so the walk can be tested without a real
/// filesystem.
pub fn find_package_root(
    start: &Path,
    marker: &str,
    probe: &dyn Fn(&Path) -> bool,
) -> Option<PathBuf> {
    let mut outermost = None;
    for ancestor in start.ancestors() {
        if probe(&ancestor.join(marker)) {
            outermost = Some(ancestor.to_path_buf());
        }
    }
    outermost
}

/// Truncate `path` at the first `node_modules` component.
///
/// `/a/b/node_modules/pkg/lib` becomes `/a/b`. A path without the segment is
/// returned unchanged.
pub fn strip_boundary_segment(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        if matches!(component, Component::Normal(name) if name == MODULE_SUBDIR) {
            break;
        }
        out.push(component.as_os_str());
    }
    out
}

/// Process-default root directory.
///
/// Walks upward from the running executable looking for the outermost
/// package boundary; falls back to stripping any boundary segment from the
/// executable path, and finally to the process working directory.
pub fn default_root() -> PathBuf {
    let start = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    let Some(start) = start else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        tracing::debug!(root = ?cwd, "No executable path; using working directory as root");
        return cwd;
    };

    match find_package_root(&start, BOUNDARY_MARKER, &|p: &Path| p.is_file()) {
        Some(root) => {
            tracing::debug!(?start, ?root, "Resolved default root from package boundary");
            root
        }
        None => {
            let root = strip_boundary_segment(&start);
            tracing::debug!(?start, ?root, "No package boundary found; stripped module segment");
            root
        }
    }
}
