// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The module graph: modules, bindings, exports and the arena that owns them.
//!
//! Modules refer to one another by [`ModuleId`] handles into an [`Arena`],
//! so cyclic graphs need no reference counting.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use indexmap::{IndexMap, IndexSet};

use crate::analyze::LocalName;
use crate::error::{LinkerError, Result};

/// Handle to a module in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) u32);

impl ModuleId {
    /// Index of the module in the arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to an interned namespace binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(pub(crate) u32);

/// Identity of a binding. Two exports resolve to the same definition exactly
/// when their binding ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingId {
    /// A binding owned by a module, by slot in its binding table
    Local {
        /// Owning module
        module: ModuleId,
        /// Slot in the module's binding table
        slot: u32,
    },
    /// A module namespace object
    Namespace(NamespaceId),
}

/// A concrete definition backing an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The anonymous default export of a module
    Default {
        /// Owning module
        module: ModuleId,
    },
    /// A named local binding
    Name {
        /// Owning module
        module: ModuleId,
        /// Local name
        name: String,
    },
    /// The namespace object of the module at a locator
    Namespace {
        /// Module whose namespace this is
        locator: Locator,
    },
}

/// Module type, which decides how a module is analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleType {
    /// ECMAScript module with declared imports and exports
    ESM,
    /// CommonJS module with heuristically detected exports
    CommonJS,
    /// JSON data
    Json,
    /// WebAssembly binary
    Wasm,
    /// Native addon
    Addon,
    /// CommonJS module as seen from an ECMAScript import
    Wrapper,
}

impl ModuleType {
    /// Module type for a loader format name.
    pub fn from_format(format: &str) -> Option<Self> {
        match format {
            "module" => Some(Self::ESM),
            "commonjs" => Some(Self::CommonJS),
            "json" => Some(Self::Json),
            "wasm" => Some(Self::Wasm),
            _ => None,
        }
    }

    /// Module type for a package.json `type` field.
    pub fn from_package_type(package_type: Option<&str>) -> Self {
        match package_type {
            Some("module") => Self::ESM,
            _ => Self::CommonJS,
        }
    }
}

/// Where a module lives. Also the module cache key.
///
/// URL keys keep their query and fragment, which are significant for
/// imported modules. Path keys are plain file paths, shared by every locator
/// that loads the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Locator {
    /// A module URL
    Url(String),
    /// A file path
    Path(PathBuf),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Target of a request, linked once the graph is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Not yet analyzed
    Unlinked(Locator),
    /// Linked to a module
    Linked(ModuleId),
}

impl Target {
    /// The linked module.
    pub fn linked(&self) -> Result<ModuleId> {
        match self {
            Self::Linked(id) => Ok(*id),
            Self::Unlinked(locator) => Err(LinkerError::invalid(
                "UnlinkedRequest",
                format!("request for {locator} was never linked"),
            )),
        }
    }
}

/// A pointer to a name in another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Specifier as written in source
    pub specifier: String,
    /// Target module
    pub target: Target,
    /// Name in the target module
    pub name: String,
}

/// A re-export of every name of another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    /// Specifier as written in source
    pub specifier: String,
    /// Target module
    pub target: Target,
}

/// A local name pulled from another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Import {
    /// A namespace import
    Namespace(BindingId),
    /// A named import
    Request(Request),
}

/// What an external name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Export {
    /// A binding defined in this module
    Binding(BindingId),
    /// An import of this module, by local name
    Import(String),
    /// A name re-exported from another module
    Request(Request),
}

/// Link progress of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Requests still point at locators
    Building,
    /// Every request and wildcard targets a module
    Linked,
}

/// A module's resolved export surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shape {
    /// Names that resolve to exactly one binding
    pub bound: IndexSet<String>,
    /// Names that resolve to conflicting bindings through wildcards
    pub ambiguous: IndexSet<String>,
}

/// A node in the module graph.
#[derive(Debug)]
pub struct Module {
    pub(crate) kind: ModuleType,
    pub(crate) locator: Locator,
    pub(crate) bindings: IndexMap<LocalName, Binding>,
    pub(crate) imports: IndexMap<String, Import>,
    pub(crate) exports: IndexMap<String, Export>,
    pub(crate) wildcards: Vec<Wildcard>,
    pub(crate) state: LinkState,
    pub(crate) shape: OnceLock<Arc<Shape>>,
}

impl Module {
    pub(crate) fn new(kind: ModuleType, locator: Locator) -> Self {
        Self {
            kind,
            locator,
            bindings: IndexMap::new(),
            imports: IndexMap::new(),
            exports: IndexMap::new(),
            wildcards: Vec::new(),
            state: LinkState::Building,
            shape: OnceLock::new(),
        }
    }

    /// Module type
    pub fn kind(&self) -> ModuleType {
        self.kind
    }

    /// Cache key of the module
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Link progress
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Exports in declaration order
    pub fn exports(&self) -> &IndexMap<String, Export> {
        &self.exports
    }

    /// Retained imports, by local name
    pub fn imports(&self) -> &IndexMap<String, Import> {
        &self.imports
    }

    /// Wildcard re-exports in declaration order
    pub fn wildcards(&self) -> &[Wildcard] {
        &self.wildcards
    }

    /// Binding for a local definition, allocating it on first use. The
    /// default binding is a singleton per module.
    pub(crate) fn local_binding(&mut self, id: ModuleId, local: LocalName) -> BindingId {
        let binding = match &local {
            LocalName::Default => Binding::Default { module: id },
            LocalName::Name(name) => Binding::Name {
                module: id,
                name: name.clone(),
            },
        };
        let (slot, _) = self.bindings.insert_full(local, binding);
        BindingId::Local {
            module: id,
            slot: slot as u32,
        }
    }

    /// Every locator this module still has to be linked against.
    pub(crate) fn unlinked(&self) -> Vec<Locator> {
        let requests = self.exports.values().filter_map(|export| match export {
            Export::Request(request) => Some(&request.target),
            _ => None,
        });
        let imports = self.imports.values().filter_map(|import| match import {
            Import::Request(request) => Some(&request.target),
            Import::Namespace(_) => None,
        });
        let wildcards = self.wildcards.iter().map(|wildcard| &wildcard.target);
        requests
            .chain(imports)
            .chain(wildcards)
            .filter_map(|target| match target {
                Target::Unlinked(locator) => Some(locator.clone()),
                Target::Linked(_) => None,
            })
            .collect()
    }

    /// Modules this module links to.
    pub(crate) fn linked(&self) -> Vec<ModuleId> {
        let requests = self.exports.values().filter_map(|export| match export {
            Export::Request(request) => Some(&request.target),
            _ => None,
        });
        let imports = self.imports.values().filter_map(|import| match import {
            Import::Request(request) => Some(&request.target),
            Import::Namespace(_) => None,
        });
        let wildcards = self.wildcards.iter().map(|wildcard| &wildcard.target);
        requests
            .chain(imports)
            .chain(wildcards)
            .filter_map(|target| match target {
                Target::Linked(id) => Some(*id),
                Target::Unlinked(_) => None,
            })
            .collect()
    }

    /// Replaces locators with modules. Wildcards that land on the same module
    /// collapse into the first of them. Linking twice is a no-op.
    pub(crate) fn link(&mut self, resolve: impl Fn(&Locator) -> Option<ModuleId>) {
        if self.state == LinkState::Linked {
            return;
        }
        let relink = |target: &mut Target| {
            if let Target::Unlinked(locator) = target {
                if let Some(id) = resolve(locator) {
                    *target = Target::Linked(id);
                }
            }
        };
        for export in self.exports.values_mut() {
            if let Export::Request(request) = export {
                relink(&mut request.target);
            }
        }
        for import in self.imports.values_mut() {
            if let Import::Request(request) = import {
                relink(&mut request.target);
            }
        }
        let mut seen = IndexSet::new();
        let wildcards = std::mem::take(&mut self.wildcards);
        for mut wildcard in wildcards {
            relink(&mut wildcard.target);
            let key = match &wildcard.target {
                Target::Linked(id) => Some(*id),
                Target::Unlinked(_) => None,
            };
            if key.is_none_or(|id| seen.insert(id)) {
                self.wildcards.push(wildcard);
            }
        }
        self.state = LinkState::Linked;
    }
}

/// Owner of every module and interned namespace.
#[derive(Debug, Default)]
pub struct Arena {
    modules: Vec<Module>,
    namespaces: IndexSet<Locator>,
}

impl Arena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if the arena holds no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Reserves a handle for a module under construction.
    pub(crate) fn reserve(&mut self, kind: ModuleType, locator: Locator) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module::new(kind, locator));
        id
    }

    /// Stores a built module in its reserved slot.
    pub(crate) fn fill(&mut self, id: ModuleId, module: Module) {
        self.modules[id.index()] = module;
    }

    /// Looks up a module.
    pub fn module(&self, id: ModuleId) -> Result<&Module> {
        self.modules.get(id.index()).ok_or_else(|| {
            LinkerError::invalid("UnknownModule", format!("no module with id {}", id.0))
        })
    }

    pub(crate) fn module_mut(&mut self, id: ModuleId) -> Result<&mut Module> {
        self.modules.get_mut(id.index()).ok_or_else(|| {
            LinkerError::invalid("UnknownModule", format!("no module with id {}", id.0))
        })
    }

    /// Interns a namespace binding. The same locator always yields the same
    /// binding.
    pub(crate) fn namespace(&mut self, locator: &Locator) -> BindingId {
        let (index, _) = self.namespaces.insert_full(locator.clone());
        BindingId::Namespace(NamespaceId(index as u32))
    }

    /// The binding behind an id.
    pub fn binding(&self, id: BindingId) -> Result<Binding> {
        let missing = || LinkerError::invalid("UnknownBinding", format!("no binding {id:?}"));
        match id {
            BindingId::Local { module, slot } => self
                .module(module)?
                .bindings
                .get_index(slot as usize)
                .map(|(_, binding)| binding.clone())
                .ok_or_else(missing),
            BindingId::Namespace(NamespaceId(index)) => self
                .namespaces
                .get_index(index as usize)
                .map(|locator| Binding::Namespace {
                    locator: locator.clone(),
                })
                .ok_or_else(missing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(value: &str) -> Locator {
        Locator::Url(value.to_owned())
    }

    #[test]
    fn test_default_binding_singleton() {
        let mut arena = Arena::new();
        let id = arena.reserve(ModuleType::ESM, url("file:///a.mjs"));
        let module = arena.module_mut(id).unwrap();
        let first = module.local_binding(id, LocalName::Default);
        let second = module.local_binding(id, LocalName::Default);
        let named = module.local_binding(id, LocalName::Name("a".into()));
        assert_eq!(first, second);
        assert_ne!(first, named);
        assert_eq!(arena.binding(first).unwrap(), Binding::Default { module: id });
    }

    #[test]
    fn test_namespace_interning() {
        let mut arena = Arena::new();
        let first = arena.namespace(&url("file:///a.mjs"));
        let second = arena.namespace(&url("file:///a.mjs"));
        let other = arena.namespace(&url("file:///a.mjs?x"));
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_link_collapses_wildcards() {
        let mut arena = Arena::new();
        let target = arena.reserve(ModuleType::Json, Locator::Path("/a.json".into()));
        let mut module = Module::new(ModuleType::ESM, url("file:///entry.mjs"));
        for specifier in ["./a.json", "./a.json?x", "./b.mjs"] {
            module.wildcards.push(Wildcard {
                specifier: specifier.to_owned(),
                target: Target::Unlinked(url(specifier)),
            });
        }
        let other = ModuleId(7);
        module.link(|locator| match locator {
            Locator::Url(value) if value.starts_with("./a.json") => Some(target),
            _ => Some(other),
        });
        assert_eq!(module.state(), LinkState::Linked);
        let targets: Vec<Target> = module.wildcards.iter().map(|w| w.target.clone()).collect();
        assert_eq!(targets, [Target::Linked(target), Target::Linked(other)]);
        assert_eq!(module.wildcards[0].specifier, "./a.json");
    }
}
