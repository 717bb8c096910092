// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Export resolution across linked module graphs

use poser_linker::{
    Binding, Linker, LinkerError, Locator, MemoryHost, ModuleId, Resolution, Result,
};

/// Links a graph of in-memory modules rooted at the first file.
async fn link(files: &[(&str, &str)]) -> (Linker<MemoryHost>, ModuleId) {
    let host = files
        .iter()
        .fold(MemoryHost::new(), |host, (path, code)| host.with_file(path, *code));
    let linker = Linker::new(host);
    let root = format!("file://{}", files[0].0);
    let id = linker.analyze_import(&root).await.unwrap();
    (linker, id)
}

fn link_error(result: Result<Resolution>) -> String {
    match result {
        Err(LinkerError::Link(message)) => message,
        other => panic!("expected link error, got {other:?}"),
    }
}

fn bound_to(linker: &Linker<MemoryHost>, result: Result<Resolution>) -> Binding {
    match result.unwrap() {
        Resolution::Binding(id) => linker.binding(id).unwrap(),
        Resolution::Ambiguous => panic!("expected binding"),
    }
}

fn module(linker: &Linker<MemoryHost>, path: &str) -> ModuleId {
    linker
        .lookup(&Locator::Url(format!("file://{path}")))
        .unwrap()
}

#[tokio::test]
async fn test_undefined_default() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { default as gadget } from './source.mjs'"),
        ("/source.mjs", ""),
    ])
    .await;
    assert_eq!(
        link_error(linker.resolve_export(entry, "gadget")),
        "The requested module './source.mjs' does not provide an export named 'default'"
    );
}

#[tokio::test]
async fn test_undefined_named() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { gadget } from './source.mjs'"),
        ("/source.mjs", ""),
    ])
    .await;
    assert_eq!(
        link_error(linker.resolve_export(entry, "gadget")),
        "The requested module './source.mjs' does not provide an export named 'gadget'"
    );
}

#[tokio::test]
async fn test_undefined_named_import() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "import { gadget } from './source.mjs'\nexport { gadget }"),
        ("/source.mjs", ""),
    ])
    .await;
    assert_eq!(
        link_error(linker.resolve_export(entry, "gadget")),
        "The requested module './source.mjs' does not provide an export named 'gadget'"
    );
}

#[tokio::test]
async fn test_undefined_named_wildcard() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { gadget } from './aggregate.mjs'"),
        ("/aggregate.mjs", "export * from './source.mjs'"),
        ("/source.mjs", ""),
    ])
    .await;
    assert_eq!(
        link_error(linker.resolve_export(entry, "gadget")),
        "The requested module './aggregate.mjs' does not provide an export named 'gadget'"
    );
}

#[tokio::test]
async fn test_undefined_top_level() {
    let (linker, entry) = link(&[("/entry.mjs", "export const a = 1")]).await;
    assert_eq!(
        link_error(linker.resolve_export(entry, "gadget")),
        "The requested module 'file:///entry.mjs' does not provide an export named 'gadget'"
    );
}

#[tokio::test]
async fn test_cycle_0() {
    let (linker, source) = link(&[("/source.mjs", "export { gadget } from './source.mjs'")]).await;
    assert_eq!(
        link_error(linker.resolve_export(source, "gadget")),
        "Detected cycle while resolving name 'gadget' in './source.mjs'"
    );
}

#[tokio::test]
async fn test_cycle_1() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { gadget } from './source.mjs'"),
        ("/source.mjs", "export { gadget } from './entry.mjs'"),
    ])
    .await;
    assert_eq!(
        link_error(linker.resolve_export(entry, "gadget")),
        "Detected cycle while resolving name 'gadget' in './source.mjs'"
    );
}

#[tokio::test]
async fn test_cycle_1_import() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { gadget } from './source.mjs'"),
        ("/source.mjs", "import { gadget } from './entry.mjs'\nexport { gadget }"),
    ])
    .await;
    assert_eq!(
        link_error(linker.resolve_export(entry, "gadget")),
        "Detected cycle while resolving name 'gadget' in './source.mjs'"
    );
}

#[tokio::test]
async fn test_cycle_wildcard() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { gadget } from './aggregate.mjs'"),
        ("/aggregate.mjs", "export * from './source.mjs'"),
        ("/source.mjs", "export { gadget } from './entry.mjs'"),
    ])
    .await;
    assert_eq!(
        link_error(linker.resolve_export(entry, "gadget")),
        "Detected cycle while resolving name 'gadget' in './source.mjs'"
    );
}

#[tokio::test]
async fn test_cycle_wildcard_override() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { gadget } from './relay.mjs'"),
        ("/relay.mjs", "export * from './aggregate.mjs'"),
        (
            "/aggregate.mjs",
            "export * from './relay.mjs'\nexport * from './source.mjs'",
        ),
        ("/source.mjs", "export const gadget = 1"),
    ])
    .await;
    let source = module(&linker, "/source.mjs");
    assert_eq!(
        bound_to(&linker, linker.resolve_export(entry, "gadget")),
        Binding::Name {
            module: source,
            name: "gadget".into()
        }
    );
}

#[tokio::test]
async fn test_ambiguous() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { value } from './aggregate.mjs'"),
        (
            "/aggregate.mjs",
            "export * from './source1.mjs'\nexport * from './source2.mjs'",
        ),
        ("/source1.mjs", "export const value = 1"),
        ("/source2.mjs", "export const value = 2"),
    ])
    .await;
    assert_eq!(
        linker.resolve_export(entry, "value").unwrap(),
        Resolution::Ambiguous
    );
}

#[tokio::test]
async fn test_ambiguous_propagate() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { value } from './aggregate1.mjs'"),
        ("/aggregate1.mjs", "export * from './aggregate2.mjs'"),
        (
            "/aggregate2.mjs",
            "export * from './source1.mjs'\nexport * from './source2.mjs'",
        ),
        ("/source1.mjs", "export const value = 1"),
        ("/source2.mjs", "export const value = 2"),
    ])
    .await;
    assert_eq!(
        linker.resolve_export(entry, "value").unwrap(),
        Resolution::Ambiguous
    );
}

#[tokio::test]
async fn test_ambiguous_default() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { value as default } from './aggregate.mjs'"),
        (
            "/aggregate.mjs",
            "export * from './source1.mjs'\nexport * from './source2.mjs'",
        ),
        ("/source1.mjs", "export const value = 1"),
        ("/source2.mjs", "export const value = 2"),
    ])
    .await;
    assert_eq!(
        linker.resolve_export(entry, "default").unwrap(),
        Resolution::Ambiguous
    );
    let shape = linker.shape(entry).unwrap();
    assert!(shape.bound.is_empty());
    assert!(shape.ambiguous.contains("default"));
}

#[tokio::test]
async fn test_direct() {
    let (linker, entry) = link(&[("/entry.mjs", "export function gadget () {}")]).await;
    assert_eq!(
        bound_to(&linker, linker.resolve_export(entry, "gadget")),
        Binding::Name {
            module: entry,
            name: "gadget".into()
        }
    );
}

#[tokio::test]
async fn test_indirect() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { gadget } from './source.mjs'"),
        ("/source.mjs", "export let gadget"),
    ])
    .await;
    let source = module(&linker, "/source.mjs");
    assert_eq!(
        bound_to(&linker, linker.resolve_export(entry, "gadget")),
        Binding::Name {
            module: source,
            name: "gadget".into()
        }
    );
}

#[tokio::test]
async fn test_indirect_import() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "import { gadget } from './source.mjs'\nexport { gadget }"),
        ("/source.mjs", "export class gadget {}"),
    ])
    .await;
    let source = module(&linker, "/source.mjs");
    assert_eq!(
        bound_to(&linker, linker.resolve_export(entry, "gadget")),
        Binding::Name {
            module: source,
            name: "gadget".into()
        }
    );
}

#[tokio::test]
async fn test_wildcard() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { gadget } from './aggregate.mjs'"),
        ("/aggregate.mjs", "export * from './source.mjs'"),
        ("/source.mjs", "export const gadget = 1"),
    ])
    .await;
    let source = module(&linker, "/source.mjs");
    assert_eq!(
        bound_to(&linker, linker.resolve_export(entry, "gadget")),
        Binding::Name {
            module: source,
            name: "gadget".into()
        }
    );
}

#[tokio::test]
async fn test_resolve_is_idempotent() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { gadget } from './aggregate.mjs'"),
        ("/aggregate.mjs", "export * from './source.mjs'"),
        ("/source.mjs", "export const gadget = 1"),
    ])
    .await;
    let aggregate = module(&linker, "/aggregate.mjs");
    let first = linker.resolve_export(entry, "gadget").unwrap();
    assert_eq!(linker.resolve_export(entry, "gadget").unwrap(), first);
    assert_eq!(linker.resolve_export(aggregate, "gadget").unwrap(), first);
    assert_eq!(linker.resolve_export(entry, "gadget").unwrap(), first);
}

#[tokio::test]
async fn test_wildcard_disambiguate() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export { gadget } from './aggregate.mjs'"),
        (
            "/aggregate.mjs",
            "export * from './relay1.mjs'\nexport * from './relay2.mjs'",
        ),
        ("/relay1.mjs", "export { gadget } from './source.mjs'"),
        ("/relay2.mjs", "export { gadget } from './source.mjs'"),
        ("/source.mjs", "export const gadget = 1"),
    ])
    .await;
    let source = module(&linker, "/source.mjs");
    assert_eq!(
        bound_to(&linker, linker.resolve_export(entry, "gadget")),
        Binding::Name {
            module: source,
            name: "gadget".into()
        }
    );
}

#[tokio::test]
async fn test_wildcard_excludes_default() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export * from './source.mjs'"),
        ("/source.mjs", "export default 1\nexport const a = 1"),
    ])
    .await;
    let shape = linker.shape(entry).unwrap();
    assert_eq!(shape.bound.iter().collect::<Vec<_>>(), ["a"]);
    assert!(linker.resolve_export(entry, "default").is_err());
}

#[tokio::test]
async fn test_namespace_reexports_share_binding() {
    let (linker, entry) = link(&[
        (
            "/entry.mjs",
            "export * from './a.mjs'\nexport * from './b.mjs'",
        ),
        ("/a.mjs", "export * as ns from './source.mjs'"),
        ("/b.mjs", "import * as ns from './source.mjs'\nexport { ns }"),
        ("/source.mjs", "export const gadget = 1"),
    ])
    .await;
    let Resolution::Binding(id) = linker.resolve_export(entry, "ns").unwrap() else {
        panic!("namespace re-exports should agree");
    };
    assert_eq!(
        linker.binding(id).unwrap(),
        Binding::Namespace {
            locator: Locator::Url("file:///source.mjs".into())
        }
    );
}

#[tokio::test]
async fn test_shape_is_memoized() {
    let (linker, entry) = link(&[
        ("/entry.mjs", "export * from './source.mjs'\nexport default 1"),
        ("/source.mjs", "export const a = 1, b = 2"),
    ])
    .await;
    let first = linker.shape(entry).unwrap();
    let second = linker.shape(entry).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(
        first.bound.iter().collect::<Vec<_>>(),
        ["default", "a", "b"]
    );
}
