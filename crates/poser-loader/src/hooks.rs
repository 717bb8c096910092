// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Resolve and load hooks.
//!
//! Resolution tags every posable module URL with its current pose ordinal,
//! or with an empty ordinal when it is not posed. Loading a URL with an
//! ordinal produces a wrapper module in place of the authentic one. The
//! wrapper imports the authentic module, and that one import is tagged
//! unposed so it reaches the real source.

use std::sync::Arc;

use dashmap::DashMap;
use poser_linker::{Host, Linker, Shape, Source};
use poser_registry::{Detail, RegistryError, Resolve};
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{LoaderError, Result};
use crate::facade::{assay, fit};
use crate::generate::Generator;
use crate::query::Client;
use crate::tag::{ModuleUrl, tag};

const PASSTHROUGH: &[&str] = &["node:", "data:"];

/// The outcome of a load hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    /// The source was produced here and no further loading is needed
    pub short_circuit: bool,
    /// Loader format of the source
    pub format: String,
    /// Module source, absent for formats the runtime reads itself
    pub source: Option<Source>,
}

/// Loader hooks over a host runtime.
pub struct Loader<H: Host> {
    linker: Linker<H>,
    client: Client,
    generator: Generator,
    config: Config,
    /// Wrapper URL to the authentic URL it imports
    wrapping: DashMap<String, String>,
}

impl<H: Host> Loader<H> {
    /// Creates loader hooks over a host.
    pub fn new(host: H, client: Client, config: Config) -> Self {
        Self::with_linker(Linker::new(host), client, config)
    }

    /// Creates loader hooks sharing an existing module graph.
    pub fn with_linker(linker: Linker<H>, client: Client, config: Config) -> Self {
        Self {
            generator: Generator::new(&config.withdraw_url),
            linker,
            client,
            config,
            wrapping: DashMap::new(),
        }
    }

    /// The module graph of authentic modules.
    pub fn linker(&self) -> &Linker<H> {
        &self.linker
    }

    /// Resolves pose specifiers the way an import in the caller would.
    pub fn resolver(&self) -> impl Resolve + use<H> {
        let linker = self.linker.clone();
        move |specifier: &str, caller: &str| -> poser_registry::Result<String> {
            linker.host().resolve(specifier, Some(caller)).map_err(|error| {
                RegistryError::Missing(
                    Detail::new("UnresolvedSpecifier")
                        .label(specifier)
                        .message(error.to_string()),
                )
            })
        }
    }

    fn is_internal(&self, url: &str) -> bool {
        url == self.config.withdraw_url
            || self
                .config
                .internal_prefix
                .as_deref()
                .is_some_and(|prefix| url.starts_with(prefix))
    }

    /// Resolves a specifier to a tagged module URL.
    #[instrument(skip(self))]
    pub async fn resolve(&self, specifier: &str, parent: Option<&str>) -> Result<String> {
        let resolved = self.linker.host().resolve(specifier, parent)?;
        let parameter = &self.config.parameter;

        if let Some(parent) = parent
            && self
                .wrapping
                .get(parent)
                .is_some_and(|authentic| *authentic == resolved)
        {
            return Ok(tag(&resolved, parameter, None));
        }
        if PASSTHROUGH.iter().any(|prefix| resolved.starts_with(prefix)) {
            return Ok(resolved);
        }
        if self.is_internal(&resolved) {
            return Ok(tag(&resolved, parameter, None));
        }

        let ordinal = self.client.query_ordinal(&resolved).await?;
        debug!(url = %resolved, ?ordinal, "tagged module");
        Ok(tag(&resolved, parameter, ordinal))
    }

    /// Loads a tagged module URL, generating a wrapper for a posed one.
    #[instrument(skip(self))]
    pub async fn load(&self, url: &str) -> Result<LoadResult> {
        if PASSTHROUGH.iter().any(|prefix| url.starts_with(prefix)) {
            return self.pass(url).await;
        }

        let mut parsed = ModuleUrl::parse(url);
        let ordinal = match parsed.get(&self.config.parameter)? {
            Some("") => return self.pass(url).await,
            value => value
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|ordinal| *ordinal > 0)
                .ok_or_else(|| {
                    LoaderError::Invalid(
                        Detail::new("InvalidOrdinal")
                            .label(url)
                            .value(value.unwrap_or("null"))
                            .note("must be positive integer"),
                    )
                })?,
        };
        parsed.delete(&self.config.parameter)?;
        let untagged = parsed.to_string();

        let (shape, facade) = tokio::try_join!(
            self.shape(&untagged),
            self.client.query_facade(&untagged, ordinal)
        )?;
        fit(&shape, &facade)?;
        let assay = assay(&shape, &facade);
        let source = self.generator.generate(&untagged, ordinal, &assay, &facade);

        self.wrapping.insert(url.to_owned(), untagged);
        debug!(ordinal, names = facade.names.len(), full = facade.full, "generated wrapper");
        Ok(LoadResult {
            short_circuit: true,
            format: "module".to_owned(),
            source: Some(Source::Text(source)),
        })
    }

    async fn shape(&self, url: &str) -> Result<Arc<Shape>> {
        let id = self.linker.analyze_import(url).await?;
        Ok(self.linker.shape(id)?)
    }

    async fn pass(&self, url: &str) -> Result<LoadResult> {
        let loaded = self.linker.host().load(url).await?;
        Ok(LoadResult {
            short_circuit: false,
            format: loaded.format,
            source: loaded.source,
        })
    }
}
