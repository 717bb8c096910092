// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS export detection.
//!
//! The export surface of a CommonJS module is only knowable by running it.
//! These heuristics recognize the assignment patterns that hand-written and
//! transpiled modules use in practice:
//!
//! - `exports.a = ...`, `module.exports.a = ...`, `exports['a'] = ...`
//! - `Object.defineProperty(exports, 'a', ...)`
//! - `module.exports = require('x')` (a wildcard)
//! - `module.exports = { a, b: ..., ...require('x') }`
//! - `__exportStar(require('x'), exports)` and `__export(require('x'))`
//!
//! Names are never removed. A trailing `module.exports = require('x')` adds
//! a wildcard but leaves earlier names in place, so the surface is a
//! superset of what is visible at runtime.

use tracing::debug;

use super::{FileRecord, LocalName, Origin};
use crate::error::Result;
use crate::lexer::{Token, TokenKind, tokenize};

/// Analyzes the statically detectable exports of a CommonJS module.
///
/// Source that cannot be tokenized yields only the default export, as the
/// module can still be loaded for its `module.exports` value.
pub fn analyze_script(source: &str) -> Result<FileRecord> {
    let mut record = FileRecord::default_only();
    let tokens = match tokenize(source) {
        Ok(tokens) => tokens,
        Err(error) => {
            debug!(%error, "CommonJS export detection skipped");
            return Ok(record);
        }
    };
    let mut detector = Detector {
        tokens: &tokens,
        record: &mut record,
    };
    detector.detect();
    Ok(record)
}

struct Detector<'t, 'r> {
    tokens: &'t [Token],
    record: &'r mut FileRecord,
}

impl<'t> Detector<'t, '_> {
    fn detect(&mut self) {
        for index in 0..self.tokens.len() {
            if let Some((next, replaceable)) = self.carrier(index) {
                self.member_assignment(next);
                if replaceable && self.at(next).is_punct("=") {
                    self.replacement(next + 1);
                }
                continue;
            }
            self.define_property(index);
            self.export_star(index);
        }
    }

    fn at(&self, index: usize) -> &'t Token {
        let tokens = self.tokens;
        &tokens[index.min(tokens.len() - 1)]
    }

    fn after_dot(&self, index: usize) -> bool {
        index > 0 && (self.tokens[index - 1].is_punct(".") || self.tokens[index - 1].is_punct("?."))
    }

    fn add_name(&mut self, name: &str) {
        if name == "default" || self.record.exports.contains_key(name) {
            return;
        }
        self.record
            .exports
            .insert(name.to_owned(), Origin::Local(LocalName::Name(name.to_owned())));
    }

    /// Matches `exports` or `module.exports` at `index`. Returns the index
    /// after the carrier, and whether the carrier is `module.exports`.
    fn carrier(&self, index: usize) -> Option<(usize, bool)> {
        if self.after_dot(index) {
            return None;
        }
        let token = self.at(index);
        if token.is_ident("exports") {
            return Some((index + 1, false));
        }
        if token.is_ident("module")
            && self.at(index + 1).is_punct(".")
            && self.at(index + 2).is_ident("exports")
        {
            return Some((index + 3, true));
        }
        None
    }

    /// `.name =` or `['name'] =` following a carrier.
    fn member_assignment(&mut self, index: usize) {
        let name = if self.at(index).is_punct(".") && self.at(index + 2).is_punct("=") {
            self.at(index + 1).ident().map(str::to_owned)
        } else if self.at(index).is_punct("[")
            && self.at(index + 2).is_punct("]")
            && self.at(index + 3).is_punct("=")
        {
            self.at(index + 1).string().map(str::to_owned)
        } else {
            None
        };
        if let Some(name) = name {
            self.add_name(&name);
        }
    }

    /// `require('specifier')` at `index`, returning the specifier.
    fn require_call(&self, index: usize) -> Option<String> {
        let matched = !self.after_dot(index)
            && self.at(index).is_ident("require")
            && self.at(index + 1).is_punct("(")
            && self.at(index + 3).is_punct(")");
        if !matched {
            return None;
        }
        self.at(index + 2).string().map(str::to_owned)
    }

    /// The right-hand side of `module.exports =`.
    fn replacement(&mut self, index: usize) {
        if let Some(specifier) = self.require_call(index) {
            self.record.wildcards.insert(specifier);
            return;
        }
        if self.at(index).is_punct("{") {
            self.object_literal(index + 1);
        }
    }

    fn object_literal(&mut self, mut index: usize) {
        loop {
            let token = self.at(index);
            let next = self.at(index + 1);
            match &token.kind {
                TokenKind::Punct("...") => {
                    let Some(specifier) = self.require_call(index + 1) else {
                        return;
                    };
                    self.record.wildcards.insert(specifier);
                    index += 5;
                }
                TokenKind::Identifier(name) if next.is_punct(",") || next.is_punct("}") => {
                    let name = name.clone();
                    self.add_name(&name);
                    index += 1;
                }
                TokenKind::Identifier(name) | TokenKind::String(name) if next.is_punct(":") => {
                    let name = name.clone();
                    self.add_name(&name);
                    index = self.skip_value(index + 2);
                }
                _ => return,
            }
            if !self.at(index).is_punct(",") {
                return;
            }
            index += 1;
        }
    }

    /// Steps over a property value, returning the index of the `,` or `}`
    /// that ends it.
    fn skip_value(&self, mut index: usize) -> usize {
        let mut depth = 0usize;
        loop {
            match &self.at(index).kind {
                TokenKind::Eof => return index,
                TokenKind::Punct("{" | "(" | "[") => depth += 1,
                TokenKind::Punct("}" | ")" | "]") => {
                    if depth == 0 {
                        return index;
                    }
                    depth -= 1;
                }
                TokenKind::Punct(",") if depth == 0 => return index,
                _ => {}
            }
            index += 1;
        }
    }

    /// `Object.defineProperty(exports, 'name', ...)`
    fn define_property(&mut self, index: usize) {
        let matched = self.at(index).is_ident("Object")
            && self.at(index + 1).is_punct(".")
            && self.at(index + 2).is_ident("defineProperty")
            && self.at(index + 3).is_punct("(");
        if !matched {
            return;
        }
        let Some((next, _)) = self.carrier(index + 4) else {
            return;
        };
        if !self.at(next).is_punct(",") {
            return;
        }
        if let Some(name) = self.at(next + 1).string().map(str::to_owned) {
            self.add_name(&name);
        }
    }

    /// `__exportStar(require('x'), exports)` and `__export(require('x'))`
    fn export_star(&mut self, index: usize) {
        let token = self.at(index);
        let helper = token.is_ident("__exportStar") || token.is_ident("__export");
        if !helper || !self.at(index + 1).is_punct("(") {
            return;
        }
        if let Some(specifier) = self.require_call(index + 2) {
            self.record.wildcards.insert(specifier);
        }
    }
}
