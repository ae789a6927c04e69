//! Command-line argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "exm", version, about = "Namespaced extension manager")]
pub struct Cli {
    /// Namespace to operate on
    #[arg(
        short = 'n',
        long,
        global = true,
        env = "EXM_NAMESPACE",
        default_value = "exm"
    )]
    pub namespace: String,

    /// Root directory for the local scope (defaults to the process root)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Scope used for install/update and config writes: local, user or system
    #[arg(long, global = true, default_value = "local")]
    pub scope: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install an extension via the external package manager
    Install {
        /// Extension id (without the namespace prefix)
        id: String,
        /// Mark the extension active in the persisted config
        #[arg(long)]
        activate: bool,
        /// Record and install the module under another namespace's prefix
        #[arg(long)]
        for_namespace: Option<String>,
    },
    /// Update all extension modules at the write scope
    Update,
    /// List outdated extension modules at the write scope
    Outdated,
    /// List the persisted activation config entries
    List,
    /// Resolve an extension through the scope search and report the result
    Resolve {
        /// Extension id
        id: String,
    },
}
