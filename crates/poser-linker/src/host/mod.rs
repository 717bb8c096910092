// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The host runtime seam.
//!
//! Everything the linker needs from the outside world goes through [`Host`]:
//! specifier resolution for both module dialects, loading imported modules,
//! reading required files and package manifest lookups.

mod fs;
mod memory;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::module::ModuleType;

pub use fs::FsHost;
pub use memory::MemoryHost;

/// Module source as produced by a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Source text
    Text(String),
    /// Binary source (WebAssembly)
    Binary(Vec<u8>),
}

impl Source {
    /// Source text, if the source is textual.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Raw bytes of the source.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// The result of loading an imported module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    /// Loader format: `module`, `commonjs`, `json`, `wasm` or `builtin`
    pub format: String,
    /// Source, absent for formats the loader reads itself
    pub source: Option<Source>,
}

/// Host runtime services.
#[async_trait]
pub trait Host: Send + Sync + 'static {
    /// Resolves an import specifier to a module URL.
    fn resolve(&self, specifier: &str, parent: Option<&str>) -> Result<String>;

    /// Resolves a require specifier to an absolute file path.
    fn require_resolve(&self, specifier: &str, parent: &Path) -> Result<PathBuf>;

    /// Loads an imported module.
    async fn load(&self, url: &str) -> Result<Loaded>;

    /// Reads a required file as text.
    async fn read(&self, path: &Path) -> Result<String>;

    /// Module type declared by the nearest package manifest of a file.
    async fn manifest_type(&self, path: &Path) -> Result<ModuleType>;
}

/// Looks up a package manifest `type` field.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct PackageJson {
    pub(crate) main: Option<String>,
    #[serde(rename = "type")]
    pub(crate) type_field: Option<String>,
}

/// Node builtin module names.
pub(crate) const BUILTINS: &[&str] = &[
    "assert",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "https",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

/// Check if a specifier names a builtin module
pub(crate) fn is_builtin(specifier: &str) -> bool {
    specifier.starts_with("node:") || BUILTINS.contains(&specifier)
}

/// Module type implied by a file extension, if the extension decides it.
pub(crate) fn format_of(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mjs") => Some("module"),
        Some("cjs") => Some("commonjs"),
        Some("json") => Some("json"),
        Some("wasm") => Some("wasm"),
        _ => None,
    }
}
