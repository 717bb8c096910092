// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Filesystem host (Node.js resolution algorithm)

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;
use url::Url;

use super::{Host, Loaded, PackageJson, Source, format_of, is_builtin};
use crate::error::{LinkerError, Result};
use crate::module::ModuleType;

/// Host backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct FsHost {
    /// Base for specifiers resolved without a parent
    base: PathBuf,
    /// File extensions to try for requires
    extensions: Vec<String>,
}

impl FsHost {
    /// Create a host resolving top-level specifiers against `base`
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            extensions: vec![".js".to_string(), ".json".to_string(), ".node".to_string()],
        }
    }

    /// Create a host rooted at the current directory
    pub fn current() -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    fn base_url(&self) -> Result<Url> {
        Url::from_directory_path(&self.base).map_err(|()| {
            LinkerError::invalid(
                "InvalidBase",
                format!("{} is not an absolute directory", self.base.display()),
            )
        })
    }

    /// Resolve a require specifier relative to a directory
    fn resolve_file(&self, specifier: &str, parent_dir: &Path) -> Option<PathBuf> {
        let path = parent_dir.join(specifier);

        // Try exact path first
        if path.is_file() {
            return Some(canonical(&path));
        }

        // Try appending each extension to the full path
        for ext in &self.extensions {
            let mut filename = path.file_name()?.to_os_string();
            filename.push(ext);
            let with_ext = path.with_file_name(filename);
            if with_ext.is_file() {
                return Some(canonical(&with_ext));
            }
        }

        // Try as directory with index file
        if path.is_dir() {
            return self.resolve_directory(&path);
        }

        None
    }

    /// Resolve a directory (package.json main or an index file)
    fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
        let main = std::fs::read_to_string(dir.join("package.json"))
            .ok()
            .and_then(|content| serde_json::from_str::<PackageJson>(&content).ok())
            .and_then(|pkg| pkg.main);
        if let Some(main) = main {
            if let Some(path) = self.resolve_file(&main, dir) {
                return Some(path);
            }
        }

        self.extensions
            .iter()
            .map(|ext| dir.join(format!("index{ext}")))
            .find(|index| index.is_file())
            .map(|index| canonical(&index))
    }

    /// Resolve a package from the nearest node_modules directory
    fn resolve_node_modules(&self, specifier: &str, parent_dir: &Path) -> Option<PathBuf> {
        let (package_name, subpath) = parse_package_specifier(specifier);

        let mut current = Some(parent_dir);
        while let Some(dir) = current {
            let package = dir.join("node_modules").join(package_name);
            if package.is_dir() {
                return match subpath {
                    Some(sub) => self.resolve_file(sub, &package),
                    None => self.resolve_directory(&package),
                };
            }
            current = dir.parent();
        }

        None
    }
}

#[async_trait]
impl Host for FsHost {
    fn resolve(&self, specifier: &str, parent: Option<&str>) -> Result<String> {
        if is_builtin(specifier) {
            let name = specifier.strip_prefix("node:").unwrap_or(specifier);
            return Ok(format!("node:{name}"));
        }
        if let Ok(url) = Url::parse(specifier) {
            return Ok(url.into());
        }

        let base = match parent {
            Some(parent) => Url::parse(parent)
                .map_err(|error| LinkerError::invalid("InvalidUrl", format!("{parent}: {error}")))?,
            None => self.base_url()?,
        };
        let not_found = || LinkerError::module_not_found(specifier, base.as_str());

        if specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
        {
            return base
                .join(specifier)
                .map(String::from)
                .map_err(|_| not_found());
        }

        let parent_path = base.to_file_path().map_err(|()| not_found())?;
        let parent_dir = if base.path().ends_with('/') {
            parent_path.as_path()
        } else {
            parent_path.parent().unwrap_or(Path::new("/"))
        };
        let path = self
            .resolve_node_modules(specifier, parent_dir)
            .ok_or_else(not_found)?;
        debug!(specifier, path = %path.display(), "resolved package import");
        Url::from_file_path(&path)
            .map(String::from)
            .map_err(|()| not_found())
    }

    fn require_resolve(&self, specifier: &str, parent: &Path) -> Result<PathBuf> {
        let not_found = || LinkerError::module_not_found(specifier, parent.display().to_string());
        if is_builtin(specifier) {
            return Err(LinkerError::Unsupported(format!(
                "builtin module '{specifier}' has no file"
            )));
        }

        let parent_dir = parent.parent().unwrap_or(Path::new("."));
        let resolved = if specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier.starts_with('/')
        {
            self.resolve_file(specifier, parent_dir)
        } else {
            self.resolve_node_modules(specifier, parent_dir)
        };
        resolved.ok_or_else(not_found)
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

        let parsed = Url::parse(url)
            .map_err(|error| LinkerError::invalid("InvalidUrl", format!("{url}: {error}")))?;
        if parsed.scheme() != "file" {
            return Err(LinkerError::Unsupported(format!(
                "cannot load {url}: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        let path = parsed
            .to_file_path()
            .map_err(|()| LinkerError::invalid("InvalidUrl", format!("{url} has no file path")))?;

        let format = match format_of(&path) {
            Some(format) => format,
            None if path.extension().is_some_and(|e| e == "js") => {
                match self.manifest_type(&path).await? {
                    ModuleType::ESM => "module",
                    _ => "commonjs",
                }
            }
            None => {
                return Err(LinkerError::invalid(
                    "InvalidExtension",
                    format!("unknown file extension for {}", path.display()),
                ));
            }
        };

        let source = match tokio::fs::read(&path).await {
            Ok(bytes) if format == "wasm" => Source::Binary(bytes),
            Ok(bytes) => Source::Text(String::from_utf8(bytes).map_err(|_| {
                LinkerError::invalid("InvalidSource", format!("{} is not UTF-8", path.display()))
            })?),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(LinkerError::module_not_found(url, ""));
            }
            Err(error) => return Err(error.into()),
        };

        Ok(Loaded {
            format: format.to_string(),
            source: Some(source),
        })
    }

    async fn read(&self, path: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn manifest_type(&self, path: &Path) -> Result<ModuleType> {
        let mut current = path.parent();
        while let Some(dir) = current {
            match tokio::fs::read_to_string(dir.join("package.json")).await {
                Ok(content) => {
                    let pkg: PackageJson = serde_json::from_str(&content)?;
                    return Ok(ModuleType::from_package_type(pkg.type_field.as_deref()));
                }
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }
            current = dir.parent();
        }

        // Default to CommonJS outside any package
        Ok(ModuleType::CommonJS)
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Parse a package specifier into name and optional subpath
fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    if let Some(scoped) = specifier.strip_prefix('@') {
        // Scoped package: @scope/name or @scope/name/subpath
        if let Some(slash_pos) = scoped.find('/') {
            let after_scope = &scoped[slash_pos + 1..];
            if let Some(subpath_pos) = after_scope.find('/') {
                let name_end = slash_pos + 2 + subpath_pos;
                return (&specifier[..name_end], Some(&specifier[name_end + 1..]));
            }
        }
        (specifier, None)
    } else {
        // Regular package: name or name/subpath
        match specifier.split_once('/') {
            Some((name, sub)) => (name, Some(sub)),
            None => (specifier, None),
        }
    }
}

/// Decodes the body of a `data:` URL.
pub(super) fn load_data(data: &str) -> Result<Loaded> {
    let (header, body) = data
        .split_once(',')
        .ok_or_else(|| LinkerError::invalid("InvalidUrl", "data URL without a body"))?;
    let (mime, base64) = match header.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (header, false),
    };
    let format = match mime.split(';').next().unwrap_or_default() {
        "text/javascript" | "application/javascript" => "module",
        "application/json" => "json",
        "application/wasm" => "wasm",
        other => {
            return Err(LinkerError::invalid(
                "UnsupportedModuleFormat",
                format!("unsupported data URL type '{other}'"),
            ));
        }
    };
    let bytes = if base64 {
        STANDARD
            .decode(body)
            .map_err(|error| LinkerError::invalid("InvalidUrl", error.to_string()))?
    } else {
        body.as_bytes().to_vec()
    };
    let source = if format == "wasm" {
        Source::Binary(bytes)
    } else {
        Source::Text(
            String::from_utf8(bytes)
                .map_err(|_| LinkerError::invalid("InvalidSource", "data URL is not UTF-8"))?,
        )
    };
    Ok(Loaded {
        format: format.to_string(),
        source: Some(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_specifier() {
        assert_eq!(parse_package_specifier("lodash"), ("lodash", None));
        assert_eq!(parse_package_specifier("lodash/get"), ("lodash", Some("get")));
        assert_eq!(parse_package_specifier("@types/node"), ("@types/node", None));
        assert_eq!(
            parse_package_specifier("@babel/core/lib/index"),
            ("@babel/core", Some("lib/index"))
        );
    }

    #[test]
    fn test_resolve_relative_keeps_query() {
        let host = FsHost::new("/");
        let url = host
            .resolve("./b.mjs?x=1#f", Some("file:///project/a.mjs"))
            .unwrap();
        assert_eq!(url, "file:///project/b.mjs?x=1#f");
    }

    #[test]
    fn test_resolve_builtin() {
        let host = FsHost::new("/");
        assert_eq!(host.resolve("fs", None).unwrap(), "node:fs");
        assert_eq!(host.resolve("node:path", None).unwrap(), "node:path");
    }

    #[test]
    fn test_load_data_base64() {
        let loaded = load_data("text/javascript;base64,ZXhwb3J0IGNvbnN0IGEgPSAx").unwrap();
        assert_eq!(loaded.format, "module");
        assert_eq!(loaded.source, Some(Source::Text("export const a = 1".into())));
    }

    #[test]
    fn test_load_data_plain_json() {
        let loaded = load_data("application/json,{}").unwrap();
        assert_eq!(loaded.format, "json");
    }

    #[tokio::test]
    async fn test_manifest_type() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("pkg");
        std::fs::create_dir_all(package.join("lib")).unwrap();
        std::fs::write(package.join("package.json"), r#"{"type":"module"}"#).unwrap();
        let host = FsHost::new(dir.path());
        let kind = host.manifest_type(&package.join("lib/a.js")).await.unwrap();
        assert_eq!(kind, ModuleType::ESM);
    }

    #[test]
    fn test_require_resolve_probes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("a.js"), "").unwrap();
        std::fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        std::fs::write(root.join("node_modules/dep/package.json"), r#"{"main":"main.js"}"#)
            .unwrap();
        std::fs::write(root.join("node_modules/dep/main.js"), "").unwrap();

        let host = FsHost::new(&root);
        let parent = root.join("entry.js");
        assert_eq!(host.require_resolve("./a", &parent).unwrap(), root.join("a.js"));
        assert_eq!(
            host.require_resolve("dep", &parent).unwrap(),
            root.join("node_modules/dep/main.js")
        );
        assert!(matches!(
            host.require_resolve("./missing", &parent),
            Err(LinkerError::ModuleNotFound { .. })
        ));
    }
}
