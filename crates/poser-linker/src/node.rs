// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Building module nodes from file records.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::analyze::{FileRecord, Imported, LocalName, Origin};
use crate::error::{LinkerError, Result};
use crate::module::{
    Arena, Export, Import, Locator, Module, ModuleId, ModuleType, Request, Shape, Target, Wildcard,
};

/// Resolved specifiers of one module, memoized for the duration of a build.
pub type Resolved = HashMap<String, Locator>;

/// The specifiers a module needs resolved before it can be built.
///
/// Imports that are never re-exported are irrelevant to the export surface
/// and are left unresolved.
pub fn specifiers(record: &FileRecord) -> IndexSet<&str> {
    let mut specifiers = IndexSet::new();
    for origin in record.exports.values() {
        match origin {
            Origin::Local(LocalName::Name(local)) => {
                if let Some((specifier, _)) = find_import(record, local) {
                    specifiers.insert(specifier);
                }
            }
            Origin::Local(LocalName::Default) => {}
            Origin::Reexport { specifier, .. } => {
                specifiers.insert(specifier.as_str());
            }
        }
    }
    for specifier in &record.wildcards {
        specifiers.insert(specifier.as_str());
    }
    specifiers
}

fn find_import<'r>(record: &'r FileRecord, local: &str) -> Option<(&'r str, &'r Imported)> {
    record.imports.iter().find_map(|(specifier, bindings)| {
        bindings
            .get(local)
            .map(|imported| (specifier.as_str(), imported))
    })
}

fn target(resolved: &Resolved, specifier: &str) -> Result<Locator> {
    resolved.get(specifier).cloned().ok_or_else(|| {
        LinkerError::invalid(
            "UnresolvedSpecifier",
            format!("specifier '{specifier}' was not resolved"),
        )
    })
}

/// Builds the module node for a file record.
///
/// Locals that name an import forward that import; every other local gets
/// its own binding. Namespace bindings are interned in the arena. Wildcards
/// whose specifiers resolve to the same locator are kept once.
pub fn build_module(
    arena: &mut Arena,
    id: ModuleId,
    kind: ModuleType,
    locator: Locator,
    record: &FileRecord,
    resolved: &Resolved,
) -> Result<Module> {
    let mut module = Module::new(kind, locator);

    for (exported, origin) in &record.exports {
        let export = match origin {
            Origin::Local(LocalName::Name(local)) => match find_import(record, local) {
                Some((specifier, imported)) => {
                    if !module.imports.contains_key(local) {
                        let locator = target(resolved, specifier)?;
                        let import = match imported {
                            Imported::Namespace => Import::Namespace(arena.namespace(&locator)),
                            Imported::Name(name) => Import::Request(Request {
                                specifier: specifier.to_owned(),
                                target: Target::Unlinked(locator),
                                name: name.clone(),
                            }),
                        };
                        module.imports.insert(local.clone(), import);
                    }
                    Export::Import(local.clone())
                }
                None => Export::Binding(module.local_binding(id, LocalName::Name(local.clone()))),
            },
            Origin::Local(LocalName::Default) => {
                Export::Binding(module.local_binding(id, LocalName::Default))
            }
            Origin::Reexport {
                specifier,
                imported: Imported::Namespace,
            } => Export::Binding(arena.namespace(&target(resolved, specifier)?)),
            Origin::Reexport {
                specifier,
                imported: Imported::Name(name),
            } => Export::Request(Request {
                specifier: specifier.clone(),
                target: Target::Unlinked(target(resolved, specifier)?),
                name: name.clone(),
            }),
        };
        module.exports.insert(exported.clone(), export);
    }

    let mut targets = IndexSet::new();
    for specifier in &record.wildcards {
        let locator = target(resolved, specifier)?;
        if targets.insert(locator.clone()) {
            module.wildcards.push(Wildcard {
                specifier: specifier.clone(),
                target: Target::Unlinked(locator),
            });
        }
    }

    Ok(module)
}

/// Builds the ECMAScript face of a CommonJS module: one binding per name the
/// CommonJS module was found to export.
pub fn build_wrapper(id: ModuleId, locator: Locator, shape: &Shape) -> Module {
    let mut module = Module::new(ModuleType::Wrapper, locator);
    for name in &shape.bound {
        let local = if name == "default" {
            LocalName::Default
        } else {
            LocalName::Name(name.clone())
        };
        let binding = module.local_binding(id, local);
        module.exports.insert(name.clone(), Export::Binding(binding));
    }
    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze_module;
    use crate::module::BindingId;

    fn resolve_all(record: &FileRecord) -> Resolved {
        specifiers(record)
            .into_iter()
            .map(|specifier| {
                let url = format!("file:///{}", specifier.trim_start_matches("./"));
                (specifier.to_owned(), Locator::Url(url))
            })
            .collect()
    }

    fn build(source: &str) -> (Arena, Module) {
        let record = analyze_module(source).unwrap();
        let resolved = resolve_all(&record);
        let mut arena = Arena::new();
        let locator = Locator::Url("file:///entry.mjs".into());
        let id = arena.reserve(ModuleType::ESM, locator.clone());
        let module = build_module(&mut arena, id, ModuleType::ESM, locator, &record, &resolved)
            .unwrap();
        (arena, module)
    }

    #[test]
    fn test_irrelevant_imports_unresolved() {
        let record = analyze_module(
            "import a from './a.mjs'\nimport { b } from './b.mjs'\nexport { b }",
        )
        .unwrap();
        let specifiers: Vec<&str> = specifiers(&record).into_iter().collect();
        assert_eq!(specifiers, ["./b.mjs"]);
    }

    #[test]
    fn test_imports_pruned_to_transmitted() {
        let (_, module) = build(
            "import a from './a.mjs'\nimport { b } from './b.mjs'\nexport { b, b as c }",
        );
        assert_eq!(module.imports().len(), 1);
        assert_eq!(module.exports()["b"], Export::Import("b".into()));
        assert_eq!(module.exports()["c"], Export::Import("b".into()));
    }

    #[test]
    fn test_shared_local_binding() {
        let (_, module) = build("const a = 1\nexport { a, a as b }\nexport default 1");
        let Export::Binding(first) = module.exports()["a"] else {
            panic!("expected binding");
        };
        assert_eq!(module.exports()["b"], Export::Binding(first));
        assert!(matches!(
            module.exports()["default"],
            Export::Binding(BindingId::Local { slot: 1, .. })
        ));
    }

    #[test]
    fn test_namespace_identity() {
        let (_, module) = build(
            "import * as ns from './a.mjs'\nexport { ns }\nexport * as other from './a.mjs'",
        );
        let Import::Namespace(imported) = module.imports()["ns"] else {
            panic!("expected namespace import");
        };
        assert_eq!(module.exports()["other"], Export::Binding(imported));
    }

    #[test]
    fn test_wildcards_deduplicated_by_target() {
        let record = analyze_module("export * from './a.mjs'\nexport * from 'a'").unwrap();
        let resolved: Resolved = ["./a.mjs", "a"]
            .into_iter()
            .map(|specifier| (specifier.to_owned(), Locator::Url("file:///a.mjs".into())))
            .collect();
        let mut arena = Arena::new();
        let locator = Locator::Url("file:///entry.mjs".into());
        let id = arena.reserve(ModuleType::ESM, locator.clone());
        let module =
            build_module(&mut arena, id, ModuleType::ESM, locator, &record, &resolved).unwrap();
        assert_eq!(module.wildcards().len(), 1);
    }

    #[test]
    fn test_unresolved_specifier() {
        let record = analyze_module("export * from './a.mjs'").unwrap();
        let mut arena = Arena::new();
        let locator = Locator::Url("file:///entry.mjs".into());
        let id = arena.reserve(ModuleType::ESM, locator.clone());
        let error = build_module(&mut arena, id, ModuleType::ESM, locator, &record, &Resolved::new())
            .unwrap_err();
        assert!(matches!(error, LinkerError::Invalid { code: "UnresolvedSpecifier", .. }));
    }

    #[test]
    fn test_wrapper_bindings() {
        let shape = Shape {
            bound: ["default", "a", "b"].into_iter().map(String::from).collect(),
            ambiguous: IndexSet::new(),
        };
        let module = build_wrapper(
            ModuleId(0),
            Locator::Url("file:///code.cjs".into()),
            &shape,
        );
        assert_eq!(module.kind(), ModuleType::Wrapper);
        assert_eq!(module.exports().len(), 3);
        assert!(module.unlinked().is_empty());
    }
}
