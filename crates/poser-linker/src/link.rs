// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Export resolution over a linked module graph.
//!
//! This follows the module linking algorithm: explicit exports are followed
//! by name, wildcards are searched in order, and a name reachable through
//! two wildcards with different bindings is ambiguous. A cycle through a
//! named re-export is an error; a cycle through wildcards only contributes
//! nothing. Resolution is synchronous and never mutates the graph except to
//! memoize a module's shape.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::error::{LinkerError, Result};
use crate::module::{Arena, BindingId, Export, Import, ModuleId, ModuleType, Request, Shape};

/// The outcome of resolving one export name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The name refers to exactly one binding
    Binding(BindingId),
    /// Wildcards provide the name with conflicting bindings
    Ambiguous,
}

/// Internal lookup result, including the sentinels that never escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Found(BindingId),
    Ambiguous,
    Cycle,
    Missing,
}

type Seen = HashSet<(ModuleId, String)>;

/// Every name visible from a module: its own exports, then the names of
/// each wildcard target. `default` never passes through a wildcard.
pub fn names(arena: &Arena, id: ModuleId) -> Result<IndexSet<String>> {
    collect_names(arena, id, &mut HashSet::new())
}

fn collect_names(
    arena: &Arena,
    id: ModuleId,
    seen: &mut HashSet<ModuleId>,
) -> Result<IndexSet<String>> {
    if !seen.insert(id) {
        return Ok(IndexSet::new());
    }
    let module = arena.module(id)?;
    let mut names: IndexSet<String> = module.exports.keys().cloned().collect();
    for wildcard in &module.wildcards {
        let target = wildcard.target.linked()?;
        for name in collect_names(arena, target, seen)? {
            if name != "default" {
                names.insert(name);
            }
        }
    }
    Ok(names)
}

/// Resolves the shape of a module, computing it at most once.
///
/// CommonJS bindings are not tracked, so every visible name of a CommonJS
/// module is bound.
pub fn resolve(arena: &Arena, id: ModuleId) -> Result<Arc<Shape>> {
    let module = arena.module(id)?;
    if let Some(shape) = module.shape.get() {
        return Ok(Arc::clone(shape));
    }

    let mut shape = Shape::default();
    if module.kind == ModuleType::CommonJS {
        shape.bound = names(arena, id)?;
    } else {
        for name in names(arena, id)? {
            match resolve_export(arena, id, &name)? {
                Resolution::Binding(_) => shape.bound.insert(name),
                Resolution::Ambiguous => shape.ambiguous.insert(name),
            };
        }
    }

    Ok(Arc::clone(module.shape.get_or_init(|| Arc::new(shape))))
}

/// Resolves an export name of a module to a binding.
///
/// Missing names and cycles through named re-exports are link errors.
pub fn resolve_export(arena: &Arena, id: ModuleId, name: &str) -> Result<Resolution> {
    let module = arena.module(id)?;
    match lookup(arena, id, name, &mut Seen::new(), None, None)? {
        Lookup::Found(binding) => Ok(Resolution::Binding(binding)),
        Lookup::Ambiguous => Ok(Resolution::Ambiguous),
        Lookup::Missing | Lookup::Cycle => Err(LinkerError::not_provided(
            &module.locator.to_string(),
            name,
        )),
    }
}

/// `specifier` is the specifier the module was reached through.
/// `diaspecifier` is the outermost specifier of the current wildcard search,
/// which is the one a user wrote and so the one diagnostics name.
fn lookup(
    arena: &Arena,
    id: ModuleId,
    name: &str,
    seen: &mut Seen,
    specifier: Option<&str>,
    diaspecifier: Option<&str>,
) -> Result<Lookup> {
    if !seen.insert((id, name.to_owned())) {
        return Ok(Lookup::Cycle);
    }

    let module = arena.module(id)?;
    if module.kind == ModuleType::CommonJS {
        return Err(LinkerError::Unsupported(
            "CommonJS bindings are not tracked".to_owned(),
        ));
    }

    if let Some(export) = module.exports.get(name) {
        return match export {
            Export::Binding(binding) => Ok(Lookup::Found(*binding)),
            Export::Import(local) => match module.imports.get(local) {
                Some(Import::Namespace(binding)) => Ok(Lookup::Found(*binding)),
                Some(Import::Request(request)) => {
                    follow(arena, request, name, seen, specifier, None)
                }
                None => Err(LinkerError::invalid(
                    "MissingImport",
                    format!("export '{name}' forwards unknown import '{local}'"),
                )),
            },
            Export::Request(request) => {
                follow(arena, request, name, seen, specifier, diaspecifier)
            }
        };
    }

    // defaults are never provided by wildcards
    if name == "default" {
        return Ok(Lookup::Missing);
    }

    let mut found = None;
    for wildcard in &module.wildcards {
        let target = wildcard.target.linked()?;
        let mut branch = seen.clone();
        let result = lookup(
            arena,
            target,
            name,
            &mut branch,
            Some(&wildcard.specifier),
            diaspecifier.or(specifier),
        )?;
        match result {
            Lookup::Ambiguous => return Ok(Lookup::Ambiguous),
            Lookup::Cycle | Lookup::Missing => {}
            Lookup::Found(binding) => match found {
                None => found = Some(binding),
                Some(prior) if prior != binding => return Ok(Lookup::Ambiguous),
                Some(_) => {}
            },
        }
    }

    Ok(found.map_or(Lookup::Missing, Lookup::Found))
}

/// Follows a named request. Reaching a cycle or a module without the name
/// is a link error here, since the path was spelled out by name.
fn follow(
    arena: &Arena,
    request: &Request,
    name: &str,
    seen: &mut Seen,
    specifier: Option<&str>,
    diaspecifier: Option<&str>,
) -> Result<Lookup> {
    let target = request.target.linked()?;
    let result = lookup(
        arena,
        target,
        &request.name,
        seen,
        Some(&request.specifier),
        diaspecifier,
    )?;
    match result {
        Lookup::Cycle => Err(LinkerError::cycle(
            name,
            specifier.unwrap_or(&request.specifier),
        )),
        Lookup::Missing => Err(LinkerError::not_provided(
            diaspecifier.unwrap_or(&request.specifier),
            &request.name,
        )),
        found => Ok(found),
    }
}
