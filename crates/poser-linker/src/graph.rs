// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module graph construction.
//!
//! The [`Linker`] discovers a module graph from a root, analyzing each module
//! once. Concurrent requests for the same module share one in-flight build.
//! Building a node never waits on another node, so cyclic graphs cannot
//! deadlock; edges are linked afterwards in breadth-first rounds.
//!
//! Cache keys follow the module system:
//! - imported modules are keyed by full URL, query and fragment included
//! - required files are keyed by path
//! - JSON imported from a `file:` URL shares the path key of a require
//! - an imported CommonJS module gets a wrapper keyed by URL around the
//!   path-keyed CommonJS module

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, try_join_all};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument};
use url::Url;

use crate::analyze::{FileRecord, analyze_module, analyze_script, analyze_wasm};
use crate::error::{LinkerError, Result};
use crate::host::{Host, Loaded, Source};
use crate::link::{self, Resolution};
use crate::module::{Arena, Binding, BindingId, Locator, Module, ModuleId, ModuleType, Shape};
use crate::node::{Resolved, build_module, build_wrapper, specifiers};

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Inner<H> {
    host: H,
    arena: RwLock<Arena>,
    modules: DashMap<Locator, ModuleId>,
    analyzing: Mutex<HashMap<Locator, SharedResult<ModuleId>>>,
    typing: Mutex<HashMap<PathBuf, SharedResult<ModuleType>>>,
}

/// Analyzes and links module graphs over a host.
///
/// Cloning is cheap; clones share every cache.
pub struct Linker<H: Host> {
    inner: Arc<Inner<H>>,
}

impl<H: Host> Clone for Linker<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: Host> Linker<H> {
    /// Creates a linker with empty caches.
    pub fn new(host: H) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                arena: RwLock::new(Arena::new()),
                modules: DashMap::new(),
                analyzing: Mutex::new(HashMap::new()),
                typing: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The host this linker runs over.
    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// Analyzes and links the graph rooted at an imported module URL.
    #[instrument(skip(self))]
    pub async fn analyze_import(&self, url: &str) -> Result<ModuleId> {
        let id = self.imported(url).await?;
        self.link_graph(id).await?;
        Ok(id)
    }

    /// Analyzes and links the graph rooted at a required file.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn analyze_require(&self, path: &Path) -> Result<ModuleId> {
        let kind = self.required_type(path).await?;
        if kind == ModuleType::ESM {
            return Err(LinkerError::invalid(
                "RequireEsm",
                format!("{} is an ECMAScript module", path.display()),
            ));
        }
        let id = self.required(path.to_path_buf(), kind).await?;
        self.link_graph(id).await?;
        Ok(id)
    }

    /// The resolved shape of a linked module, computed once.
    pub fn shape(&self, id: ModuleId) -> Result<Arc<Shape>> {
        link::resolve(&self.inner.arena.read(), id)
    }

    /// Resolves one export name of a linked module.
    pub fn resolve_export(&self, id: ModuleId, name: &str) -> Result<Resolution> {
        link::resolve_export(&self.inner.arena.read(), id, name)
    }

    /// Every export name visible from a linked module.
    pub fn names(&self, id: ModuleId) -> Result<IndexSet<String>> {
        link::names(&self.inner.arena.read(), id)
    }

    /// The binding behind an id.
    pub fn binding(&self, id: BindingId) -> Result<Binding> {
        self.inner.arena.read().binding(id)
    }

    /// Runs a function against a module.
    pub fn inspect<R>(&self, id: ModuleId, f: impl FnOnce(&Module) -> R) -> Result<R> {
        let arena = self.inner.arena.read();
        Ok(f(arena.module(id)?))
    }

    /// The module cached under a locator, if it has been built.
    pub fn lookup(&self, locator: &Locator) -> Option<ModuleId> {
        self.inner.modules.get(locator).map(|entry| *entry.value())
    }

    /// Number of modules built so far
    pub fn len(&self) -> usize {
        self.inner.arena.read().len()
    }

    /// Returns true if no module has been built.
    pub fn is_empty(&self) -> bool {
        self.inner.arena.read().is_empty()
    }

    /// Returns the in-flight build for a locator, starting it if needed. A
    /// failed build is forgotten so a later request retries it.
    fn coalesce<F>(&self, locator: Locator, build: impl FnOnce() -> F) -> SharedResult<ModuleId>
    where
        F: Future<Output = Result<ModuleId>> + Send + 'static,
    {
        let mut analyzing = self.inner.analyzing.lock();
        analyzing
            .entry(locator.clone())
            .or_insert_with(|| {
                let linker = self.clone();
                let build = build();
                async move {
                    let result = build.await;
                    if result.is_err() {
                        linker.inner.analyzing.lock().remove(&locator);
                    }
                    result
                }
                .boxed()
                .shared()
            })
            .clone()
    }

    fn imported(&self, url: &str) -> SharedResult<ModuleId> {
        let linker = self.clone();
        let url = url.to_owned();
        self.coalesce(Locator::Url(url.clone()), move || async move {
            linker.build_imported(url).await
        })
    }

    fn required(&self, path: PathBuf, kind: ModuleType) -> SharedResult<ModuleId> {
        let linker = self.clone();
        self.coalesce(Locator::Path(path.clone()), move || async move {
            linker.build_required(path, kind).await
        })
    }

    async fn build_imported(&self, url: String) -> Result<ModuleId> {
        let loaded = self.inner.host.load(&url).await?;
        let kind = ModuleType::from_format(&loaded.format).ok_or_else(|| {
            LinkerError::invalid(
                "UnsupportedModuleFormat",
                format!("unsupported module format '{}' for {url}", loaded.format),
            )
        })?;
        debug!(%url, ?kind, "analyzing imported module");
        let locator = Locator::Url(url.clone());

        match kind {
            ModuleType::ESM => {
                let record = analyze_module(&text(loaded, &url)?)?;
                let resolved = resolve_specifiers(&record, |specifier| {
                    self.inner
                        .host
                        .resolve(specifier, Some(&url))
                        .map(Locator::Url)
                })?;
                self.register(kind, locator, &record, &resolved)
            }
            ModuleType::CommonJS => {
                let wrapped = self.required(file_path(&url)?, ModuleType::CommonJS).await?;
                self.link_graph(wrapped).await?;
                let shape = self.shape(wrapped)?;
                Ok(self.register_wrapper(locator, &shape))
            }
            ModuleType::Json if url.starts_with("file:") => {
                let id = self.required(file_path(&url)?, ModuleType::Json).await?;
                self.inner.modules.insert(locator, id);
                Ok(id)
            }
            ModuleType::Json => {
                self.register(kind, locator, &FileRecord::default_only(), &Resolved::new())
            }
            ModuleType::Wasm => {
                let Some(Source::Binary(bytes)) = loaded.source else {
                    return Err(LinkerError::invalid(
                        "InvalidModuleSource",
                        format!("WebAssembly source for {url} must be binary"),
                    ));
                };
                let record = analyze_wasm(&bytes)?;
                self.register(kind, locator, &record, &Resolved::new())
            }
            ModuleType::Addon | ModuleType::Wrapper => Err(LinkerError::invalid(
                "UnexpectedModuleType",
                format!("{url} cannot be imported as {kind:?}"),
            )),
        }
    }

    async fn build_required(&self, path: PathBuf, kind: ModuleType) -> Result<ModuleId> {
        debug!(path = %path.display(), ?kind, "analyzing required module");
        match kind {
            ModuleType::CommonJS => {
                let code = self.inner.host.read(&path).await?;
                let record = analyze_script(&code)?;
                let resolved = resolve_specifiers(&record, |specifier| {
                    self.inner
                        .host
                        .require_resolve(specifier, &path)
                        .map(Locator::Path)
                })?;
                self.register(kind, Locator::Path(path), &record, &resolved)
            }
            ModuleType::Json | ModuleType::Addon => self.register(
                kind,
                Locator::Path(path),
                &FileRecord::default_only(),
                &Resolved::new(),
            ),
            _ => Err(LinkerError::invalid(
                "UnexpectedModuleType",
                format!("{} cannot be required as {kind:?}", path.display()),
            )),
        }
    }

    fn register(
        &self,
        kind: ModuleType,
        locator: Locator,
        record: &FileRecord,
        resolved: &Resolved,
    ) -> Result<ModuleId> {
        let id = {
            let mut arena = self.inner.arena.write();
            let id = arena.reserve(kind, locator.clone());
            let module = build_module(&mut arena, id, kind, locator.clone(), record, resolved)?;
            arena.fill(id, module);
            id
        };
        self.inner.modules.insert(locator, id);
        Ok(id)
    }

    fn register_wrapper(&self, locator: Locator, shape: &Shape) -> ModuleId {
        let id = {
            let mut arena = self.inner.arena.write();
            let id = arena.reserve(ModuleType::Wrapper, locator.clone());
            arena.fill(id, build_wrapper(id, locator.clone(), shape));
            id
        };
        self.inner.modules.insert(locator, id);
        id
    }

    /// Links every module reachable from a root, one breadth-first round at
    /// a time. The targets of a round are built concurrently.
    async fn link_graph(&self, root: ModuleId) -> Result<()> {
        let mut visited = HashSet::from([root]);
        let mut frontier = vec![root];

        while !frontier.is_empty() {
            // first parent wins, for diagnostics
            let edges: IndexMap<Locator, Locator> = {
                let arena = self.inner.arena.read();
                let mut edges = IndexMap::new();
                for id in &frontier {
                    let module = arena.module(*id)?;
                    for locator in module.unlinked() {
                        edges
                            .entry(locator)
                            .or_insert_with(|| module.locator.clone());
                    }
                }
                edges
            };

            let targets = try_join_all(
                edges
                    .into_iter()
                    .map(|(locator, parent)| self.target(locator, parent)),
            )
            .await?;
            let targets: HashMap<Locator, ModuleId> = targets.into_iter().collect();

            let mut next = Vec::new();
            {
                let mut arena = self.inner.arena.write();
                for id in &frontier {
                    let module = arena.module_mut(*id)?;
                    module.link(|locator| targets.get(locator).copied());
                    next.extend(
                        module
                            .linked()
                            .into_iter()
                            .filter(|target| visited.insert(*target)),
                    );
                }
            }
            frontier = next;
        }
        Ok(())
    }

    async fn target(&self, locator: Locator, parent: Locator) -> Result<(Locator, ModuleId)> {
        let id = match &locator {
            Locator::Url(url) => self.imported(url).await?,
            Locator::Path(path) => {
                let kind = self.required_type(path).await?;
                if kind == ModuleType::ESM {
                    return Err(LinkerError::RequireEsm {
                        module: path.display().to_string(),
                        from: parent.to_string(),
                    });
                }
                self.required(path.clone(), kind).await?
            }
        };
        Ok((locator, id))
    }

    /// Module type of a required file, by extension and then manifest.
    async fn required_type(&self, path: &Path) -> Result<ModuleType> {
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some("cjs") => ModuleType::CommonJS,
            Some("mjs") => ModuleType::ESM,
            Some("json") => ModuleType::Json,
            Some("node") => ModuleType::Addon,
            Some("js") => return self.manifest_type(path).await,
            _ => ModuleType::CommonJS,
        };
        Ok(kind)
    }

    fn manifest_type(&self, path: &Path) -> SharedResult<ModuleType> {
        let mut typing = self.inner.typing.lock();
        typing
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                let linker = self.clone();
                let path = path.to_path_buf();
                async move { linker.inner.host.manifest_type(&path).await }
                    .boxed()
                    .shared()
            })
            .clone()
    }
}

fn resolve_specifiers(
    record: &FileRecord,
    resolve: impl Fn(&str) -> Result<Locator>,
) -> Result<Resolved> {
    specifiers(record)
        .into_iter()
        .map(|specifier| Ok((specifier.to_owned(), resolve(specifier)?)))
        .collect()
}

fn missing_source(url: &str) -> LinkerError {
    LinkerError::invalid("InvalidModuleSource", format!("no source loaded for {url}"))
}

/// Source text of a loaded module. Binary source must be UTF-8.
fn text(loaded: Loaded, url: &str) -> Result<String> {
    match loaded.source {
        Some(Source::Text(text)) => Ok(text),
        Some(Source::Binary(bytes)) => String::from_utf8(bytes).map_err(|error| {
            LinkerError::invalid("InvalidModuleSource", format!("{url} is not UTF-8: {error}"))
        }),
        None => Err(missing_source(url)),
    }
}

fn file_path(url: &str) -> Result<PathBuf> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.to_file_path().ok())
        .ok_or_else(|| LinkerError::invalid("InvalidUrl", format!("{url} is not a file URL")))
}
