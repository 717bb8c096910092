// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Wrapper module generation.
//!
//! A wrapper module stands in for a posed module. It forwards whatever the
//! pose leaves alone from the authentic module and exports the posed values,
//! which it withdraws from the registry when evaluated.
//!
//! A full pose hides the authentic exports instead of forwarding them:
//! bound names become `undefined` and ambiguous names are recreated as
//! ambiguous by two identical inline modules. An ambiguous default cannot
//! be recreated that way, so it becomes a thrown `SyntaxError`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexSet;
use poser_linker::lexer::is_reserved_word;
use serde_json::Value;
use unicode_xid::UnicodeXID;

use crate::facade::{Assay, Facade};
use crate::identifiers::Identifiers;

const AMBIGUOUS_DEFAULT: &str =
    "throw new SyntaxError('The default export is backed by conflicting star exports')";

/// Bindings the wrapper declares itself.
const LOCALS: &[&str] = &["facade", "withdraw"];

/// Generates wrapper module source.
#[derive(Debug, Clone)]
pub struct Generator {
    withdraw: String,
}

impl Generator {
    /// Creates a generator whose wrappers import `withdraw` from `withdraw_url`.
    pub fn new(withdraw_url: impl AsRef<str>) -> Self {
        Self {
            withdraw: quote(withdraw_url.as_ref()),
        }
    }

    /// Source of the wrapper module for pose `ordinal` of `url`.
    pub fn generate(&self, url: &str, ordinal: u64, assay: &Assay, facade: &Facade) -> String {
        let specifier = quote(url);
        let mut aliases = None;
        let mut lines = Vec::new();

        if facade.full {
            elide(&mut aliases, &mut lines, assay);
        } else if assay.envelop {
            lines.push(format!("import {specifier}"));
        } else {
            if assay.default {
                lines.push(format!("export {{ default }} from {specifier}"));
            }
            if assay.named {
                lines.push(format!("export * from {specifier}"));
            }
        }

        if !facade.names.is_empty() {
            lines.push(format!("import withdraw from {}", self.withdraw));
            lines.push(format!("const facade = withdraw({specifier}, {ordinal})"));
            export_facade(&mut aliases, &mut lines, &facade.names);
        }

        lines.join("\n")
    }
}

/// Export names split by how they can be written.
struct Names<'a> {
    default: bool,
    identifiers: Vec<&'a str>,
    strings: Vec<&'a str>,
}

impl<'a> Names<'a> {
    fn classify(names: &'a IndexSet<String>) -> Self {
        let mut classified = Self {
            default: false,
            identifiers: Vec::new(),
            strings: Vec::new(),
        };
        for name in names {
            if name == "default" {
                classified.default = true;
            } else if is_identifier(name) {
                classified.identifiers.push(name);
            } else {
                classified.strings.push(name);
            }
        }
        classified
    }

    fn has_named(&self) -> bool {
        !(self.identifiers.is_empty() && self.strings.is_empty())
    }
}

fn elide(aliases: &mut Option<Identifiers>, lines: &mut Vec<String>, assay: &Assay) {
    if !assay.relay.is_empty() {
        let aliases = aliases.get_or_insert_with(Identifiers::new);
        let names = Names::classify(&assay.relay);
        if names.default {
            lines.push("export default undefined".to_owned());
        }
        if names.has_named() {
            placeholders(aliases, &names, lines);
        }
    }

    if !assay.ambiguous.is_empty() {
        let names = Names::classify(&assay.ambiguous);
        if names.default {
            lines.push(AMBIGUOUS_DEFAULT.to_owned());
        }
        if names.has_named() {
            let source = ambiguous_module(&names);
            for trailer in ["// 1", "// 2"] {
                let inline = inline_module(&format!("{source}\n{trailer}"));
                lines.push(format!("export * from {}", quote(&inline)));
            }
        }
    }
}

/// Declares an `undefined` alias per name and exports it under the name.
fn placeholders(aliases: &mut Identifiers, names: &Names<'_>, lines: &mut Vec<String>) {
    let mut declares = Vec::new();
    let mut exports = Vec::new();
    for &name in &names.identifiers {
        let alias = aliases.fresh();
        declares.push(format!("{alias} = undefined"));
        exports.push(if alias == name {
            alias
        } else {
            format!("{alias} as {name}")
        });
    }
    for &name in &names.strings {
        let alias = aliases.fresh();
        declares.push(format!("{alias} = undefined"));
        exports.push(format!("{alias} as {}", quote(name)));
    }
    lines.push(format!("const {}", declares.join(", ")));
    lines.push(format!("export {{ {} }}", exports.join(", ")));
}

/// A module exporting every name as `undefined`. Two copies of it that
/// differ only in a comment make each name ambiguous.
fn ambiguous_module(names: &Names<'_>) -> String {
    let mut lines = Vec::new();
    if names.strings.is_empty() {
        let declares: Vec<_> = names
            .identifiers
            .iter()
            .map(|name| format!("{name} = undefined"))
            .collect();
        lines.push(format!("const {}", declares.join(", ")));
        lines.push(format!("export {{ {} }}", names.identifiers.join(", ")));
    } else {
        placeholders(&mut Identifiers::new(), names, &mut lines);
    }
    lines.join("\n")
}

fn export_facade(aliases: &mut Option<Identifiers>, lines: &mut Vec<String>, posed: &IndexSet<String>) {
    let names = Names::classify(posed);
    if !names.strings.is_empty() {
        aliases.get_or_insert_with(Identifiers::new);
    }
    if names.default {
        lines.push("export default facade.default".to_owned());
    }

    match aliases {
        Some(aliases) if names.has_named() => {
            let mut extracts = Vec::new();
            let mut exports = Vec::new();
            for &name in &names.identifiers {
                let alias = aliases.fresh();
                if alias == name {
                    extracts.push(alias.clone());
                    exports.push(alias);
                } else {
                    extracts.push(format!("{name}: {alias}"));
                    exports.push(format!("{alias} as {name}"));
                }
            }
            for &name in &names.strings {
                let alias = aliases.fresh();
                let string = quote(name);
                extracts.push(format!("{string}: {alias}"));
                exports.push(format!("{alias} as {string}"));
            }
            lines.push(format!("const {{ {} }} = facade", extracts.join(", ")));
            lines.push(format!("export {{ {} }}", exports.join(", ")));
        }
        Some(_) => {}
        None if !names.identifiers.is_empty() => {
            lines.push(format!(
                "export const {{ {} }} = facade",
                names.identifiers.join(", ")
            ));
        }
        None => {}
    }
}

/// Whether `name` can be written as a binding identifier in the wrapper.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let start = first == '$' || first == '_' || first.is_xid_start();
    start
        && chars.all(|c| c == '$' || c == '\u{200c}' || c == '\u{200d}' || c.is_xid_continue())
        && !is_reserved_word(name)
        && !LOCALS.contains(&name)
}

/// JSON string literal, which is also a valid module specifier literal.
fn quote(text: &str) -> String {
    Value::String(text.to_owned()).to_string()
}

/// `data:` URL of an inline module.
pub fn inline_module(source: &str) -> String {
    format!("data:text/javascript;base64,{}", STANDARD.encode(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITHDRAW: &str = "poser:withdraw";
    const AUTHENTIC: &str = "file:///";

    fn generate(assay: Assay, names: &[&str], full: bool) -> String {
        Generator::new(WITHDRAW).generate(AUTHENTIC, 1, &assay, &Facade::new(names.iter().copied(), full))
    }

    fn flags(envelop: bool, default: bool, named: bool) -> Assay {
        Assay {
            envelop,
            default,
            named,
            ..Assay::default()
        }
    }

    fn set(names: &[&str]) -> IndexSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn facade_lines(rest: &str) -> String {
        format!("import withdraw from \"{WITHDRAW}\"\nconst facade = withdraw(\"{AUTHENTIC}\", 1)\n{rest}")
    }

    #[test]
    fn test_bare() {
        assert_eq!(generate(flags(true, false, false), &[], false), "import \"file:///\"");
    }

    #[test]
    fn test_unchanged() {
        assert_eq!(
            generate(flags(false, true, false), &[], false),
            "export { default } from \"file:///\""
        );
        assert_eq!(generate(flags(false, false, true), &[], false), "export * from \"file:///\"");
        assert_eq!(
            generate(flags(false, true, true), &[], false),
            "export { default } from \"file:///\"\nexport * from \"file:///\""
        );
    }

    #[test]
    fn test_envelop_default() {
        assert_eq!(
            generate(flags(true, false, false), &["default"], false),
            format!("import \"file:///\"\n{}", facade_lines("export default facade.default"))
        );
    }

    #[test]
    fn test_envelop_default_named() {
        assert_eq!(
            generate(flags(true, false, false), &["default", "a", "b", "c"], false),
            format!(
                "import \"file:///\"\n{}",
                facade_lines("export default facade.default\nexport const { a, b, c } = facade")
            )
        );
    }

    #[test]
    fn test_envelop_named_string() {
        assert_eq!(
            generate(flags(true, false, false), &["string a", "string b", "string c"], false),
            format!(
                "import \"file:///\"\n{}",
                facade_lines(concat!(
                    "const { \"string a\": $a, \"string b\": $b, \"string c\": $c } = facade\n",
                    "export { $a as \"string a\", $b as \"string b\", $c as \"string c\" }"
                ))
            )
        );
    }

    #[test]
    fn test_envelop_named_id_string() {
        assert_eq!(
            generate(flags(true, false, false), &["a", "b", "string a", "string b"], false),
            format!(
                "import \"file:///\"\n{}",
                facade_lines(concat!(
                    "const { a: $a, b: $b, \"string a\": $c, \"string b\": $d } = facade\n",
                    "export { $a as a, $b as b, $c as \"string a\", $d as \"string b\" }"
                ))
            )
        );
    }

    #[test]
    fn test_envelop_named_id_string_coalesce() {
        assert_eq!(
            generate(flags(true, false, false), &["$a", "$b", "string a"], false),
            format!(
                "import \"file:///\"\n{}",
                facade_lines(concat!(
                    "const { $a, $b, \"string a\": $c } = facade\n",
                    "export { $a, $b, $c as \"string a\" }"
                ))
            )
        );
    }

    #[test]
    fn test_partial_default() {
        assert_eq!(
            generate(flags(false, false, true), &["default"], false),
            format!(
                "export * from \"file:///\"\n{}",
                facade_lines("export default facade.default")
            )
        );
    }

    #[test]
    fn test_partial_named() {
        assert_eq!(
            generate(flags(false, true, true), &["a", "b", "c"], false),
            format!(
                "export {{ default }} from \"file:///\"\nexport * from \"file:///\"\n{}",
                facade_lines("export const { a, b, c } = facade")
            )
        );
    }

    #[test]
    fn test_full_bound_default() {
        let assay = Assay {
            default: true,
            relay: set(&["default"]),
            ..Assay::default()
        };
        assert_eq!(
            generate(assay, &["a", "b", "c"], true),
            format!(
                "export default undefined\n{}",
                facade_lines(concat!(
                    "const { a: $a, b: $b, c: $c } = facade\n",
                    "export { $a as a, $b as b, $c as c }"
                ))
            )
        );
    }

    #[test]
    fn test_full_bound_named() {
        let assay = Assay {
            named: true,
            relay: set(&["a", "b"]),
            ..Assay::default()
        };
        assert_eq!(
            generate(assay, &["c"], true),
            format!(
                "const $a = undefined, $b = undefined\nexport {{ $a as a, $b as b }}\n{}",
                facade_lines("const { c: $c } = facade\nexport { $c as c }")
            )
        );
    }

    #[test]
    fn test_full_ambiguous_default() {
        let assay = Assay {
            default: true,
            ambiguous: set(&["default"]),
            ..Assay::default()
        };
        assert_eq!(
            generate(assay, &["a", "b", "c"], true),
            format!("{AMBIGUOUS_DEFAULT}\n{}", facade_lines("export const { a, b, c } = facade"))
        );
    }

    #[test]
    fn test_full_ambiguous_named() {
        let assay = Assay {
            named: true,
            ambiguous: set(&["value"]),
            ..Assay::default()
        };
        let source = "const value = undefined\nexport { value }";
        let first = inline_module(&format!("{source}\n// 1"));
        let second = inline_module(&format!("{source}\n// 2"));
        assert_eq!(
            generate(assay, &["a", "b", "c"], true),
            format!(
                "export * from \"{first}\"\nexport * from \"{second}\"\n{}",
                facade_lines("export const { a, b, c } = facade")
            )
        );
    }

    #[test]
    fn test_full_ambiguous_named_string() {
        let assay = Assay {
            named: true,
            ambiguous: set(&["string value"]),
            ..Assay::default()
        };
        let source = "const $a = undefined\nexport { $a as \"string value\" }";
        let first = inline_module(&format!("{source}\n// 1"));
        let second = inline_module(&format!("{source}\n// 2"));
        assert_eq!(
            generate(assay, &["a", "b", "c"], true),
            format!(
                "export * from \"{first}\"\nexport * from \"{second}\"\n{}",
                facade_lines("export const { a, b, c } = facade")
            )
        );
    }

    #[test]
    fn test_wrapper_locals_are_aliased() {
        assert_eq!(
            generate(flags(true, false, false), &["facade", "class"], false),
            format!(
                "import \"file:///\"\n{}",
                facade_lines(concat!(
                    "const { \"facade\": $a, \"class\": $b } = facade\n",
                    "export { $a as \"facade\", $b as \"class\" }"
                ))
            )
        );
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("a"));
        assert!(is_identifier("$a"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("ünïcödé"));
        assert!(is_identifier("a\u{200d}b"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1a"));
        assert!(!is_identifier("string a"));
        assert!(!is_identifier("new"));
        assert!(!is_identifier("enum"));
        assert!(!is_identifier("yield"));
        assert!(!is_identifier("withdraw"));
    }

    #[test]
    fn test_inline_module() {
        assert_eq!(inline_module("a"), "data:text/javascript;base64,YQ==");
    }
}
