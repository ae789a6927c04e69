//! Command implementations

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use exm_core::{Host, HostOptions, Registry};
use exm_fs::Scope;

use crate::error::{Error, Result};

/// Shared per-invocation context derived from the global arguments.
pub struct Context {
    pub namespace: String,
    pub root: Option<PathBuf>,
    pub scope: Scope,
}

impl Context {
    pub fn new(namespace: String, root: Option<PathBuf>, scope: &str) -> Result<Self> {
        let scope = scope.parse::<Scope>().map_err(Error::Usage)?;
        Ok(Self {
            namespace,
            root,
            scope,
        })
    }

    /// Register the namespace with the process registry and return its host.
    fn host(&self) -> Result<Arc<Host>> {
        let mut options = HostOptions::new(&self.namespace).write_scope(self.scope);
        if let Some(root) = &self.root {
            options = options.root_dir(root);
        }
        Ok(Registry::global().register_namespace(options)?)
    }
}

pub async fn run_install(
    ctx: &Context,
    id: &str,
    activate: bool,
    for_namespace: Option<&str>,
) -> Result<()> {
    let host = ctx.host()?;
    host.install_extension(id, activate, for_namespace).await?;

    let ns = for_namespace.unwrap_or(&ctx.namespace);
    println!(
        "{} {} at {} scope{}",
        "installed".green().bold(),
        exm_fs::module_name(ns, id).cyan(),
        ctx.scope,
        if activate { " (active)" } else { "" }
    );
    Ok(())
}

pub async fn run_update(ctx: &Context) -> Result<()> {
    let host = ctx.host()?;
    host.update_extensions().await?;
    println!(
        "{} extensions at {} scope",
        "updated".green().bold(),
        ctx.scope
    );
    Ok(())
}

pub async fn run_outdated(ctx: &Context) -> Result<()> {
    let host = ctx.host()?;
    let report = host.list_outdated_extensions().await?;

    if report.is_empty() {
        println!("All extension modules are up to date.");
        return Ok(());
    }
    for (module, info) in &report {
        println!(
            "{}  current {}  wanted {}  latest {}",
            module.cyan(),
            info.current.as_deref().unwrap_or("-"),
            info.wanted.as_deref().unwrap_or("-"),
            info.latest.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub fn run_list(ctx: &Context) -> Result<()> {
    let host = ctx.host()?;
    let records = host.config_records();

    if records.is_empty() {
        println!(
            "No extensions recorded for namespace '{}'.",
            ctx.namespace
        );
        return Ok(());
    }
    for record in records {
        let marker = if record.active {
            "active".green()
        } else {
            "inactive".dimmed()
        };
        println!("{}  {}  [{}]", record.module.cyan(), record.ns, marker);
    }
    Ok(())
}

pub fn run_resolve(ctx: &Context, id: &str) -> Result<()> {
    let host = ctx.host()?;
    let extension = host.require_extension(id)?;

    println!(
        "{} {}",
        "resolved".green().bold(),
        extension.identity().cyan()
    );
    let exports = extension.exports().names();
    if !exports.is_empty() {
        println!("exports: {}", exports.join(", "));
    }
    Ok(())
}
