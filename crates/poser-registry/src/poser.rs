// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The posing API.
//!
//! Specifiers are resolved relative to the module that poses them, the same
//! way an import written in that module would be.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Detail, RegistryError, Result};
use crate::registry::Registry;

/// Resolves a specifier written in the caller module to a module URL.
pub trait Resolve: Send + Sync + 'static {
    /// Resolves `specifier` relative to `caller`.
    fn resolve(&self, specifier: &str, caller: &str) -> Result<String>;
}

impl<F> Resolve for F
where
    F: Fn(&str, &str) -> Result<String> + Send + Sync + 'static,
{
    fn resolve(&self, specifier: &str, caller: &str) -> Result<String> {
        self(specifier, caller)
    }
}

/// Deposits poses on behalf of calling modules.
pub struct Poser<R, V = Value> {
    registry: Arc<Registry<V>>,
    resolver: R,
}

impl<R: Resolve, V: Clone> Poser<R, V> {
    /// Creates a poser over a registry.
    pub fn new(registry: Arc<Registry<V>>, resolver: R) -> Self {
        Self { registry, resolver }
    }

    /// The registry poses are deposited in.
    pub fn registry(&self) -> &Arc<Registry<V>> {
        &self.registry
    }

    /// Overrides some exports of a module, keeping the rest.
    pub fn pose(&self, specifier: &str, caller: &str, exports: IndexMap<String, V>) -> Result<u64> {
        self.deposit(specifier, caller, Some(exports), false)
    }

    /// Overrides a module entirely; unposed exports become undefined.
    pub fn pose_all(&self, specifier: &str, caller: &str, exports: IndexMap<String, V>) -> Result<u64> {
        self.deposit(specifier, caller, Some(exports), true)
    }

    /// Overrides the default export of a module.
    pub fn pose_default(&self, specifier: &str, caller: &str, value: V) -> Result<u64> {
        self.deposit(specifier, caller, Some(default_only(value)), false)
    }

    /// Replaces a module with one that has only a default export.
    pub fn pose_all_default(&self, specifier: &str, caller: &str, value: V) -> Result<u64> {
        self.deposit(specifier, caller, Some(default_only(value)), true)
    }

    /// Restores the authentic exports of a module.
    pub fn clear(&self, specifier: &str, caller: &str) -> Result<u64> {
        self.deposit(specifier, caller, None, false)
    }

    fn deposit(
        &self,
        specifier: &str,
        caller: &str,
        exports: Option<IndexMap<String, V>>,
        full: bool,
    ) -> Result<u64> {
        if specifier.is_empty() {
            return Err(RegistryError::Invalid(
                Detail::new("InvalidSpecifier")
                    .value("\"\"")
                    .note("must be nonempty string"),
            ));
        }
        let url = self.resolver.resolve(specifier, caller)?;
        self.registry.deposit(&url, exports, full)
    }
}

fn default_only<V>(value: V) -> IndexMap<String, V> {
    IndexMap::from([("default".to_owned(), value)])
}
