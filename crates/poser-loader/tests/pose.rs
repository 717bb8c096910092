// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

use std::sync::Arc;

use indexmap::IndexMap;
use poser_linker::{MemoryHost, Source};
use poser_loader::{Client, Config, LoaderError, Loader};
use poser_registry::{Clerk, PoseState, Poser, Registry, WITHDRAW_URL, channel};
use serde_json::{Value, json};

const ENTRY: &str = "file:///app/entry.mjs";

struct Harness {
    registry: Arc<Registry>,
    loader: Loader<MemoryHost>,
}

impl Harness {
    fn new(host: MemoryHost) -> Self {
        Self::with_config(host, Config::default())
    }

    fn with_config(host: MemoryHost, config: Config) -> Self {
        let registry = Arc::new(config.registry());
        let (loader_end, registry_end) = channel();
        Arc::new(Clerk::new(Arc::clone(&registry)))
            .install(registry_end)
            .unwrap();
        let client = Client::connect(loader_end, &config);
        Self {
            registry,
            loader: Loader::new(host, client, config),
        }
    }

    fn poser(&self) -> Poser<impl poser_registry::Resolve> {
        Poser::new(Arc::clone(&self.registry), self.loader.resolver())
    }

    async fn wrapper(&self, specifier: &str) -> Result<String, LoaderError> {
        let url = self.loader.resolve(specifier, Some(ENTRY)).await?;
        let loaded = self.loader.load(&url).await?;
        assert!(loaded.short_circuit);
        assert_eq!(loaded.format, "module");
        match loaded.source {
            Some(Source::Text(text)) => Ok(text),
            other => panic!("unexpected source {other:?}"),
        }
    }
}

fn exports(value: Value) -> IndexMap<String, Value> {
    serde_json::from_value(value).unwrap()
}

fn abc() -> MemoryHost {
    MemoryHost::new().with_file(
        "/app/dep.mjs",
        "export const a = 1\nexport const b = 2\nexport const c = 3\n",
    )
}

#[tokio::test]
async fn test_pose_named() {
    let harness = Harness::new(abc());
    harness
        .poser()
        .pose("./dep.mjs", ENTRY, exports(json!({"b": "posed"})))
        .unwrap();

    let url = harness.loader.resolve("./dep.mjs", Some(ENTRY)).await.unwrap();
    assert_eq!(url, "file:///app/dep.mjs?pose=1");
    let stack = harness.registry.snapshot("file:///app/dep.mjs").unwrap();
    assert_eq!(stack.poses[&1].state, PoseState::Loading);

    let loaded = harness.loader.load(&url).await.unwrap();
    assert_eq!(
        loaded.source,
        Some(Source::Text(
            [
                "export * from \"file:///app/dep.mjs\"",
                "import withdraw from \"poser:withdraw\"",
                "const facade = withdraw(\"file:///app/dep.mjs\", 1)",
                "export const { b } = facade",
            ]
            .join("\n")
        ))
    );

    // the wrapper's own import reaches the authentic module
    let authentic = harness
        .loader
        .resolve("file:///app/dep.mjs", Some(&url))
        .await
        .unwrap();
    assert_eq!(authentic, "file:///app/dep.mjs?pose=");
    let loaded = harness.loader.load(&authentic).await.unwrap();
    assert!(!loaded.short_circuit);
    assert_eq!(loaded.format, "module");

    let withdraw = harness
        .loader
        .resolve("poser:withdraw", Some(&url))
        .await
        .unwrap();
    assert_eq!(withdraw, "poser:withdraw?pose=");

    let facade = harness.registry.withdraw("file:///app/dep.mjs", 1).unwrap();
    assert_eq!(facade["b"], json!("posed"));
}

#[tokio::test]
async fn test_unposed_passes_through() {
    let harness = Harness::new(abc());
    let url = harness.loader.resolve("./dep.mjs", Some(ENTRY)).await.unwrap();
    assert_eq!(url, "file:///app/dep.mjs?pose=");
    let loaded = harness.loader.load(&url).await.unwrap();
    assert!(!loaded.short_circuit);
    assert!(loaded.source.is_some());
}

#[tokio::test]
async fn test_builtins_pass_through() {
    let harness = Harness::new(abc());
    let url = harness.loader.resolve("fs", Some(ENTRY)).await.unwrap();
    assert_eq!(url, "node:fs");
    let loaded = harness.loader.load(&url).await.unwrap();
    assert_eq!(loaded.format, "builtin");
    assert_eq!(loaded.source, None);
}

#[tokio::test]
async fn test_pose_all_default() {
    let host = MemoryHost::new().with_file(
        "/app/dep.mjs",
        "export default function () {}\nexport const a = 1\n",
    );
    let harness = Harness::new(host);
    harness
        .poser()
        .pose_all_default("./dep.mjs", ENTRY, json!(42))
        .unwrap();
    assert_eq!(
        harness.wrapper("./dep.mjs").await.unwrap(),
        [
            "const $a = undefined",
            "export { $a as a }",
            "import withdraw from \"poser:withdraw\"",
            "const facade = withdraw(\"file:///app/dep.mjs\", 1)",
            "export default facade.default",
        ]
        .join("\n")
    );
}

#[tokio::test]
async fn test_pose_every_export_envelops() {
    let harness = Harness::new(abc());
    harness
        .poser()
        .pose("./dep.mjs", ENTRY, exports(json!({"a": 0, "b": 0, "c": 0})))
        .unwrap();
    assert_eq!(
        harness.wrapper("./dep.mjs").await.unwrap(),
        [
            "import \"file:///app/dep.mjs\"",
            "import withdraw from \"poser:withdraw\"",
            "const facade = withdraw(\"file:///app/dep.mjs\", 1)",
            "export const { a, b, c } = facade",
        ]
        .join("\n")
    );
}

#[tokio::test]
async fn test_pose_commonjs() {
    let host = MemoryHost::new().with_file("/app/dep.cjs", "exports.a = 1\nexports.b = 2\n");
    let harness = Harness::new(host);
    harness
        .poser()
        .pose("./dep.cjs", ENTRY, exports(json!({"b": 0})))
        .unwrap();
    assert_eq!(
        harness.wrapper("./dep.cjs").await.unwrap(),
        [
            "export { default } from \"file:///app/dep.cjs\"",
            "export * from \"file:///app/dep.cjs\"",
            "import withdraw from \"poser:withdraw\"",
            "const facade = withdraw(\"file:///app/dep.cjs\", 1)",
            "export const { b } = facade",
        ]
        .join("\n")
    );
}

#[tokio::test]
async fn test_phantom_pose() {
    let harness = Harness::new(abc());
    harness
        .poser()
        .pose("./dep.mjs", ENTRY, exports(json!({"d": 0})))
        .unwrap();
    let error = harness.wrapper("./dep.mjs").await.unwrap_err();
    assert!(matches!(error, LoaderError::Invalid(_)));
    assert_eq!(error.code(), Some("PhantomPose"));
}

#[tokio::test]
async fn test_ambiguous_pose() {
    let host = MemoryHost::new()
        .with_file(
            "/app/dep.mjs",
            "export * from './one.mjs'\nexport * from './two.mjs'\n",
        )
        .with_file("/app/one.mjs", "export const x = 1\n")
        .with_file("/app/two.mjs", "export const x = 2\n");
    let harness = Harness::new(host);
    harness
        .poser()
        .pose("./dep.mjs", ENTRY, exports(json!({"x": 0})))
        .unwrap();
    let error = harness.wrapper("./dep.mjs").await.unwrap_err();
    assert_eq!(error.code(), Some("AmbiguousPose"));
}

#[tokio::test]
async fn test_internal_modules_are_unposed() {
    let host = abc().with_file("/poser/withdraw.mjs", "export default function () {}\n");
    let config = Config {
        internal_prefix: Some("file:///poser/".to_owned()),
        ..Config::default()
    };
    let harness = Harness::with_config(host, config);
    let url = harness
        .loader
        .resolve("/poser/withdraw.mjs", Some(ENTRY))
        .await
        .unwrap();
    assert_eq!(url, "file:///poser/withdraw.mjs?pose=");

    let error = harness
        .poser()
        .pose("/poser/withdraw.mjs", ENTRY, exports(json!({"default": 0})))
        .unwrap_err();
    assert_eq!(error.code(), "ForbiddenPose");
}

#[tokio::test]
async fn test_withdraw_url_cannot_be_posed() {
    let harness = Harness::new(abc());
    let error = harness
        .registry
        .deposit(WITHDRAW_URL, Some(exports(json!({"withdraw": 0}))), false)
        .unwrap_err();
    assert_eq!(error.code(), "ForbiddenPose");
    let url = harness.loader.resolve(WITHDRAW_URL, Some(ENTRY)).await.unwrap();
    assert_eq!(url, "poser:withdraw?pose=");
}

#[tokio::test]
async fn test_invalid_ordinal() {
    let harness = Harness::new(abc());
    let error = harness
        .loader
        .load("file:///app/dep.mjs?pose=first")
        .await
        .unwrap_err();
    assert_eq!(error.code(), Some("InvalidOrdinal"));
}

#[tokio::test]
async fn test_untagged_load() {
    let harness = Harness::new(abc());
    let error = harness.loader.load("file:///app/dep.mjs").await.unwrap_err();
    assert_eq!(error.code(), Some("MissingParameter"));
}

#[tokio::test]
async fn test_repose_gets_new_instance() {
    let harness = Harness::new(abc());
    let poser = harness.poser();
    poser.pose("./dep.mjs", ENTRY, exports(json!({"a": 0}))).unwrap();
    let first = harness.loader.resolve("./dep.mjs", Some(ENTRY)).await.unwrap();
    poser.pose("./dep.mjs", ENTRY, exports(json!({"b": 0}))).unwrap();
    let second = harness.loader.resolve("./dep.mjs", Some(ENTRY)).await.unwrap();
    assert_eq!(first, "file:///app/dep.mjs?pose=1");
    assert_eq!(second, "file:///app/dep.mjs?pose=2");

    // the first pose was claimed, so it survives the second deposit
    let wrapper = harness.loader.load(&first).await.unwrap();
    assert!(wrapper.short_circuit);
    let facade = harness.registry.withdraw("file:///app/dep.mjs", 1).unwrap();
    assert_eq!(facade.keys().collect::<Vec<_>>(), ["a"]);

    let source = harness.wrapper("./dep.mjs").await.unwrap();
    assert!(source.ends_with("export const { a, b } = facade"));
}
