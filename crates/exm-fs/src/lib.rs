//! Filesystem layer for the exm extension manager.
//!
//! This crate knows about paths and files only: the three scoped extension
//! directories of a namespace, package-root discovery, atomic writes, and the
//! marker files an install directory must carry. Everything about hosts,
//! configs and extensions lives in `exm-core`.

pub mod error;
pub mod io;
pub mod paths;

pub use error::{Error, Result};
pub use io::{EXM_MARKER, ensure_install_layout, ensure_marker, write_atomic};
pub use paths::{
    BOUNDARY_MARKER, MODULE_SUBDIR, Scope, ScopePaths, default_root, find_package_root,
    module_dir, module_name, strip_boundary_segment,
};
