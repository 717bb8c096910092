// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! In-memory host for tests and embedding.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use url::Url;

use super::fs::load_data;
use super::{Host, Loaded, PackageJson, Source, format_of, is_builtin};
use crate::error::{LinkerError, Result};
use crate::module::ModuleType;

const EXTENSIONS: &[&str] = &[".js", ".json", ".node"];

/// Host over a virtual file tree.
///
/// Files are keyed by absolute path and served as `file:` URLs. Package
/// manifests are ordinary `package.json` files in the tree.
#[derive(Debug, Default)]
pub struct MemoryHost {
    files: RwLock<HashMap<PathBuf, Source>>,
    loads: AtomicUsize,
}

impl MemoryHost {
    /// Creates an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text file.
    pub fn with_file(self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, Source::Text(text.into()));
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&self, path: impl AsRef<Path>, source: Source) {
        self.files.write().insert(normalize(path.as_ref()), source);
    }

    /// Number of loads and reads served so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files.read().keys().any(|file| file.starts_with(path) && file != path)
    }

    fn text(&self, path: &Path) -> Option<String> {
        match self.files.read().get(path) {
            Some(Source::Text(text)) => Some(text.clone()),
            _ => None,
        }
    }

    fn probe(&self, path: &Path) -> Option<PathBuf> {
        if self.is_file(path) {
            return Some(path.to_path_buf());
        }
        for ext in EXTENSIONS {
            let mut filename = path.file_name()?.to_os_string();
            filename.push(ext);
            let with_ext = path.with_file_name(filename);
            if self.is_file(&with_ext) {
                return Some(with_ext);
            }
        }
        if self.is_dir(path) {
            let main = self
                .text(&path.join("package.json"))
                .and_then(|content| serde_json::from_str::<PackageJson>(&content).ok())
                .and_then(|pkg| pkg.main);
            if let Some(found) = main.and_then(|main| self.probe(&normalize(&path.join(main)))) {
                return Some(found);
            }
            return EXTENSIONS
                .iter()
                .map(|ext| path.join(format!("index{ext}")))
                .find(|index| self.is_file(index));
        }
        None
    }

    fn package(&self, specifier: &str, parent_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(parent_dir);
        while let Some(dir) = current {
            let package = dir.join("node_modules").join(specifier);
            if let Some(found) = self.probe(&package) {
                return Some(found);
            }
            current = dir.parent();
        }
        None
    }
}

#[async_trait]
impl Host for MemoryHost {
    fn resolve(&self, specifier: &str, parent: Option<&str>) -> Result<String> {
        if is_builtin(specifier) {
            let name = specifier.strip_prefix("node:").unwrap_or(specifier);
            return Ok(format!("node:{name}"));
        }
        if let Ok(url) = Url::parse(specifier) {
            return Ok(url.into());
        }
        let base = Url::parse(parent.unwrap_or("file:///"))
            .map_err(|error| LinkerError::invalid("InvalidUrl", error.to_string()))?;
        let not_found = || LinkerError::module_not_found(specifier, base.as_str());

        if specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
        {
            return base.join(specifier).map(String::from).map_err(|_| not_found());
        }
        let parent_path = base.to_file_path().map_err(|()| not_found())?;
        let parent_dir = parent_path.parent().unwrap_or(Path::new("/"));
        let path = self.package(specifier, parent_dir).ok_or_else(not_found)?;
        Url::from_file_path(&path)
            .map(String::from)
            .map_err(|()| not_found())
    }

    fn require_resolve(&self, specifier: &str, parent: &Path) -> Result<PathBuf> {
        let parent_dir = parent.parent().unwrap_or(Path::new("/"));
        let resolved = if specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier.starts_with('/')
        {
            self.probe(&normalize(&parent_dir.join(specifier)))
        } else {
            self.package(specifier, parent_dir)
        };
        resolved.ok_or_else(|| LinkerError::module_not_found(specifier, parent.display().to_string()))
    }

    async fn load(&self, url: &str) -> Result<Loaded> {
        if url.starts_with("node:") {
            return Ok(Loaded {
                format: "builtin".to_string(),
                source: None,
            });
        }
        if let Some(data) = url.strip_prefix("data:") {
            return load_data(data);
        }

        let path = Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.to_file_path().ok())
            .ok_or_else(|| LinkerError::invalid("InvalidUrl", format!("{url} is not a file URL")))?;
        let format = match format_of(&path) {
            Some(format) => format,
            None => match self.manifest_type(&path).await? {
                ModuleType::ESM => "module",
                _ => "commonjs",
            },
        };
        let source = self
            .files
            .read()
            .get(&path)
            .cloned()
            .ok_or_else(|| LinkerError::module_not_found(url, ""))?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Loaded {
            format: format.to_string(),
            source: Some(source),
        })
    }

    async fn read(&self, path: &Path) -> Result<String> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.text(path)
            .ok_or_else(|| LinkerError::Io(format!("no such file: {}", path.display())))
    }

    async fn manifest_type(&self, path: &Path) -> Result<ModuleType> {
        let mut current = path.parent();
        while let Some(dir) = current {
            if let Some(content) = self.text(&dir.join("package.json")) {
                let pkg: PackageJson = serde_json::from_str(&content)?;
                return Ok(ModuleType::from_package_type(pkg.type_field.as_deref()));
            }
            current = dir.parent();
        }
        Ok(ModuleType::CommonJS)
    }
}

/// Lexically resolves `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> MemoryHost {
        MemoryHost::new()
            .with_file("/project/a.cjs", "")
            .with_file("/project/lib/index.js", "")
            .with_file("/project/node_modules/dep/package.json", r#"{"main":"./main"}"#)
            .with_file("/project/node_modules/dep/main.js", "")
            .with_file("/project/package.json", r#"{"type":"module"}"#)
    }

    #[test]
    fn test_require_resolve() {
        let host = host();
        let parent = Path::new("/project/entry.cjs");
        assert_eq!(
            host.require_resolve("./a.cjs", parent).unwrap(),
            Path::new("/project/a.cjs")
        );
        assert_eq!(
            host.require_resolve("./lib", parent).unwrap(),
            Path::new("/project/lib/index.js")
        );
        assert_eq!(
            host.require_resolve("../project/./a.cjs", parent).unwrap(),
            Path::new("/project/a.cjs")
        );
        assert_eq!(
            host.require_resolve("dep", parent).unwrap(),
            Path::new("/project/node_modules/dep/main.js")
        );
    }

    #[test]
    fn test_resolve_package_import() {
        let host = host();
        let url = host.resolve("dep", Some("file:///project/entry.mjs")).unwrap();
        assert_eq!(url, "file:///project/node_modules/dep/main.js");
    }

    #[tokio::test]
    async fn test_load_uses_manifest_type() {
        let host = host();
        let loaded = host.load("file:///project/lib/index.js").await.unwrap();
        assert_eq!(loaded.format, "module");
        assert_eq!(host.loads(), 1);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let error = host().load("file:///project/missing.mjs").await.unwrap_err();
        assert!(matches!(error, LinkerError::ModuleNotFound { .. }));
    }
}
