// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use owo_colors::OwoColorize;
use poser_linker::{FsHost, Linker, Source};
use poser_loader::{Client, Config, Loader};
use poser_registry::{Clerk, Registry, channel};
use serde_json::Value;
use tracing::info;
use url::Url;

/// Turns a path or URL argument into a module URL.
pub async fn module_url(module: &str) -> Result<String> {
    if let Ok(url) = Url::parse(module)
        && url.scheme().len() > 1
    {
        return Ok(url.into());
    }
    let path = tokio::fs::canonicalize(Path::new(module))
        .await
        .with_context(|| format!("module not found: {module}"))?;
    Url::from_file_path(&path)
        .map(String::from)
        .map_err(|()| anyhow::anyhow!("not an absolute path: {}", path.display()))
}

pub async fn shape(module: &str) -> Result<()> {
    let url = module_url(module).await?;
    let linker = Linker::new(FsHost::current()?);
    let id = linker.analyze_import(&url).await?;
    let shape = linker.shape(id)?;

    println!("{}", url.bold());
    for name in &shape.bound {
        println!("  {} {}", "bound".green(), name);
    }
    for name in &shape.ambiguous {
        println!("  {} {}", "ambiguous".yellow(), name);
    }
    Ok(())
}

pub async fn names(module: &str) -> Result<()> {
    let url = module_url(module).await?;
    let linker = Linker::new(FsHost::current()?);
    let id = linker.analyze_import(&url).await?;
    for name in linker.names(id)? {
        println!("{name}");
    }
    Ok(())
}

/// Poses `names` in an in-process registry and prints the wrapper module.
pub async fn generate(module: &str, names: &[String], full: bool, config: Config) -> Result<()> {
    if names.is_empty() && !full {
        bail!("nothing to pose, pass --pose or --full");
    }
    let url = module_url(module).await?;

    let registry: Arc<Registry> = Arc::new(config.registry());
    let (loader_end, registry_end) = channel();
    Arc::new(Clerk::new(Arc::clone(&registry))).install(registry_end)?;
    let client = Client::connect(loader_end, &config);
    let loader = Loader::new(FsHost::current()?, client, config);

    let exports: IndexMap<String, Value> =
        names.iter().map(|name| (name.clone(), Value::Null)).collect();
    let ordinal = registry.deposit(&url, Some(exports), full)?;
    info!(url = %url, ordinal, "posed module");

    let tagged = loader.resolve(&url, None).await?;
    let loaded = loader.load(&tagged).await?;
    match loaded.source {
        Some(Source::Text(source)) => println!("{source}"),
        _ => bail!("{url} produced no wrapper source"),
    }
    Ok(())
}
