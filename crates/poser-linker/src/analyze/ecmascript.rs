// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! ECMAScript module declaration walker.

use indexmap::IndexMap;

use super::{FileRecord, Imported, LocalName, Origin};
use crate::error::{LinkerError, Result};
use crate::lexer::{Token, TokenKind, tokenize};

/// Analyzes the import and export declarations of an ECMAScript module.
///
/// Only top-level declarations are considered, which is the only place the
/// grammar allows them. Malformed declarations are syntax errors.
pub fn analyze_module(source: &str) -> Result<FileRecord> {
    let tokens = tokenize(source)?;
    let mut walker = Walker {
        tokens: &tokens,
        pos: 0,
        record: FileRecord::default(),
    };
    walker.walk()?;
    Ok(walker.record)
}

struct Walker<'t> {
    tokens: &'t [Token],
    pos: usize,
    record: FileRecord,
}

impl<'t> Walker<'t> {
    fn walk(&mut self) -> Result<()> {
        let mut depth = 0usize;
        let mut after_dot = false;
        loop {
            let token = self.peek();
            match &token.kind {
                TokenKind::Eof => return Ok(()),
                TokenKind::Punct("{" | "(" | "[") => depth += 1,
                TokenKind::Punct("}" | ")" | "]") => depth = depth.saturating_sub(1),
                TokenKind::Identifier(word) if depth == 0 && !after_dot => {
                    if word == "export" {
                        self.pos += 1;
                        self.parse_export()?;
                        after_dot = false;
                        continue;
                    }
                    // import() and import.meta are expressions
                    let next = self.peek_at(1);
                    if word == "import" && !next.is_punct("(") && !next.is_punct(".") {
                        self.pos += 1;
                        self.parse_import()?;
                        after_dot = false;
                        continue;
                    }
                }
                _ => {}
            }
            after_dot = token.is_punct(".") || token.is_punct("?.");
            self.pos += 1;
        }
    }

    fn peek(&self) -> &'t Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &'t Token {
        let tokens = self.tokens;
        let last = tokens.len() - 1;
        &tokens[(self.pos + offset).min(last)]
    }

    fn bump(&mut self) -> &'t Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        let found = self.peek().is_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        let found = self.peek().is_ident(word);
        if found {
            self.pos += 1;
        }
        found
    }

    fn unexpected(&self) -> LinkerError {
        let token = self.peek();
        let message = match &token.kind {
            TokenKind::Eof => "Unexpected end of input".to_owned(),
            TokenKind::Identifier(word) => format!("Unexpected token '{word}'"),
            TokenKind::Punct(p) => format!("Unexpected token '{p}'"),
            TokenKind::String(_) => "Unexpected string".to_owned(),
            _ => "Unexpected token".to_owned(),
        };
        LinkerError::syntax(message, token.span.start)
    }

    fn expect_punct(&mut self, punct: &str) -> Result<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_ident(&mut self, word: &str) -> Result<()> {
        if self.eat_ident(word) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.peek().string() {
            Some(value) => {
                self.pos += 1;
                Ok(value.to_owned())
            }
            None => Err(self.unexpected()),
        }
    }

    fn expect_binding(&mut self) -> Result<String> {
        match self.peek().ident() {
            Some(name) => {
                self.pos += 1;
                Ok(name.to_owned())
            }
            None => Err(self.unexpected()),
        }
    }

    /// An identifier or string naming an export. Returns the name and whether
    /// it was written as a string.
    fn module_export_name(&mut self) -> Result<(String, bool)> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Identifier(name) => {
                self.pos += 1;
                Ok((name.clone(), false))
            }
            TokenKind::String(value) => {
                self.pos += 1;
                Ok((value.clone(), true))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn from_clause(&mut self) -> Result<String> {
        self.expect_ident("from")?;
        let specifier = self.expect_string()?;
        self.skip_attributes();
        self.eat_punct(";");
        Ok(specifier)
    }

    /// Skips `with { ... }` and the legacy `assert { ... }` import attributes.
    fn skip_attributes(&mut self) {
        let token = self.peek();
        let keyword = token.is_ident("with") || (token.is_ident("assert") && !token.newline_before);
        if !keyword || !self.peek_at(1).is_punct("{") {
            return;
        }
        self.pos += 1;
        let mut depth = 0usize;
        loop {
            match self.bump().kind {
                TokenKind::Eof => return,
                TokenKind::Punct("{") => depth += 1,
                TokenKind::Punct("}") => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn insert_export(&mut self, name: String, origin: Origin, offset: usize) -> Result<()> {
        if self.record.exports.contains_key(&name) {
            return Err(LinkerError::syntax(
                format!("Duplicate export of '{name}'"),
                offset,
            ));
        }
        self.record.exports.insert(name, origin);
        Ok(())
    }

    fn parse_import(&mut self) -> Result<()> {
        if self.peek().string().is_some() {
            let specifier = self.expect_string()?;
            self.skip_attributes();
            self.eat_punct(";");
            self.record.imports.entry(specifier).or_default();
            return Ok(());
        }

        let mut bindings = IndexMap::new();
        let mut more = true;
        if let Some(local) = self.peek().ident() {
            self.pos += 1;
            bindings.insert(local.to_owned(), Imported::Name("default".to_owned()));
            more = self.eat_punct(",");
        }

        if more {
            if self.eat_punct("*") {
                self.expect_ident("as")?;
                let local = self.expect_binding()?;
                bindings.insert(local, Imported::Namespace);
            } else if self.eat_punct("{") {
                while !self.eat_punct("}") {
                    let (imported, is_string) = self.module_export_name()?;
                    let local = if self.eat_ident("as") {
                        self.expect_binding()?
                    } else if is_string {
                        return Err(self.unexpected());
                    } else {
                        imported.clone()
                    };
                    bindings.insert(local, Imported::Name(imported));
                    if !self.eat_punct(",") {
                        self.expect_punct("}")?;
                        break;
                    }
                }
            } else {
                return Err(self.unexpected());
            }
        }

        let specifier = self.from_clause()?;
        self.record
            .imports
            .entry(specifier)
            .or_default()
            .extend(bindings);
        Ok(())
    }

    fn parse_export(&mut self) -> Result<()> {
        let token = self.peek();
        let offset = token.span.start;
        match &token.kind {
            TokenKind::Punct("*") => {
                self.pos += 1;
                if self.eat_ident("as") {
                    let (name, _) = self.module_export_name()?;
                    let specifier = self.from_clause()?;
                    let origin = Origin::Reexport {
                        specifier,
                        imported: Imported::Namespace,
                    };
                    self.insert_export(name, origin, offset)
                } else {
                    let specifier = self.from_clause()?;
                    self.record.wildcards.insert(specifier);
                    Ok(())
                }
            }
            TokenKind::Punct("{") => {
                self.pos += 1;
                self.parse_export_list(offset)
            }
            TokenKind::Identifier(word) => match word.as_str() {
                "default" => {
                    self.pos += 1;
                    let local = self.default_declaration();
                    self.insert_export("default".to_owned(), Origin::Local(local), offset)
                }
                "var" | "let" | "const" => {
                    self.pos += 1;
                    let mut names = Vec::new();
                    self.declarators(&mut names)?;
                    for name in names {
                        let origin = Origin::Local(LocalName::Name(name.clone()));
                        self.insert_export(name, origin, offset)?;
                    }
                    Ok(())
                }
                "function" | "async" | "class" => {
                    let name = self.declaration_name()?;
                    let origin = Origin::Local(LocalName::Name(name.clone()));
                    self.insert_export(name, origin, offset)
                }
                _ => Err(self.unexpected()),
            },
            _ => Err(self.unexpected()),
        }
    }

    fn parse_export_list(&mut self, offset: usize) -> Result<()> {
        let mut specifiers = Vec::new();
        while !self.eat_punct("}") {
            let (local, local_is_string) = self.module_export_name()?;
            let exported = if self.eat_ident("as") {
                self.module_export_name()?.0
            } else {
                local.clone()
            };
            specifiers.push((local, local_is_string, exported));
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }

        if self.peek().is_ident("from") {
            let specifier = self.from_clause()?;
            for (local, _, exported) in specifiers {
                let origin = Origin::Reexport {
                    specifier: specifier.clone(),
                    imported: Imported::Name(local),
                };
                self.insert_export(exported, origin, offset)?;
            }
            return Ok(());
        }

        self.eat_punct(";");
        for (local, local_is_string, exported) in specifiers {
            if local_is_string {
                return Err(LinkerError::syntax(
                    format!("String export '{local}' requires a from clause"),
                    offset,
                ));
            }
            self.insert_export(exported, Origin::Local(LocalName::Name(local)), offset)?;
        }
        Ok(())
    }

    /// The binding behind `export default`. Expressions are left for the main
    /// walk to step over.
    fn default_declaration(&mut self) -> LocalName {
        if self.peek().is_ident("async")
            && self.peek_at(1).is_ident("function")
            && !self.peek_at(1).newline_before
        {
            self.pos += 1;
        }
        if self.eat_ident("function") {
            self.eat_punct("*");
            if let Some(name) = self.peek().ident() {
                self.pos += 1;
                return LocalName::Name(name.to_owned());
            }
        } else if self.eat_ident("class") {
            if let Some(name) = self.peek().ident().filter(|name| *name != "extends") {
                self.pos += 1;
                return LocalName::Name(name.to_owned());
            }
        }
        LocalName::Default
    }

    fn declaration_name(&mut self) -> Result<String> {
        if self.eat_ident("async") {
            if self.peek().newline_before {
                return Err(self.unexpected());
            }
            self.expect_ident("function")?;
            self.eat_punct("*");
        } else if self.eat_ident("function") {
            self.eat_punct("*");
        } else {
            self.expect_ident("class")?;
        }
        self.expect_binding()
    }

    fn declarators(&mut self, names: &mut Vec<String>) -> Result<()> {
        loop {
            self.binding_pattern(names)?;
            if self.eat_punct("=") {
                self.skip_expression();
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.eat_punct(";");
        Ok(())
    }

    fn binding_pattern(&mut self, names: &mut Vec<String>) -> Result<()> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Identifier(name) => {
                self.pos += 1;
                names.push(name.clone());
                Ok(())
            }
            TokenKind::Punct("[") => {
                self.pos += 1;
                loop {
                    if self.eat_punct("]") {
                        return Ok(());
                    }
                    if self.eat_punct(",") {
                        continue;
                    }
                    self.eat_punct("...");
                    self.binding_pattern(names)?;
                    if self.eat_punct("=") {
                        self.skip_expression();
                    }
                    if !self.eat_punct(",") {
                        return self.expect_punct("]");
                    }
                }
            }
            TokenKind::Punct("{") => {
                self.pos += 1;
                loop {
                    if self.eat_punct("}") {
                        return Ok(());
                    }
                    if self.eat_punct("...") {
                        self.binding_pattern(names)?;
                    } else {
                        self.property_pattern(names)?;
                    }
                    if self.eat_punct("=") {
                        self.skip_expression();
                    }
                    if !self.eat_punct(",") {
                        return self.expect_punct("}");
                    }
                }
            }
            _ => Err(self.unexpected()),
        }
    }

    fn property_pattern(&mut self, names: &mut Vec<String>) -> Result<()> {
        let token = self.peek();
        match &token.kind {
            TokenKind::Identifier(name) => {
                self.pos += 1;
                if self.eat_punct(":") {
                    self.binding_pattern(names)
                } else {
                    names.push(name.clone());
                    Ok(())
                }
            }
            TokenKind::String(_) | TokenKind::Number => {
                self.pos += 1;
                self.expect_punct(":")?;
                self.binding_pattern(names)
            }
            TokenKind::Punct("[") => {
                self.pos += 1;
                self.skip_expression();
                self.expect_punct("]")?;
                self.expect_punct(":")?;
                self.binding_pattern(names)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Steps over an expression, stopping before a top-level `,` or `;`, an
    /// unbalanced closer, or a line break where automatic semicolon insertion
    /// ends the statement.
    fn skip_expression(&mut self) {
        let mut depth = 0usize;
        let mut prev: Option<&Token> = None;
        loop {
            let token = self.peek();
            match &token.kind {
                TokenKind::Eof => return,
                TokenKind::Punct("{" | "(" | "[") => depth += 1,
                TokenKind::Punct("}" | ")" | "]") => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Punct("," | ";") if depth == 0 => return,
                _ if depth == 0
                    && token.newline_before
                    && prev.is_some_and(Token::ends_expression)
                    && starts_statement(token) =>
                {
                    return;
                }
                _ => {}
            }
            prev = Some(token);
            self.pos += 1;
        }
    }
}

fn starts_statement(token: &Token) -> bool {
    match &token.kind {
        TokenKind::Identifier(word) => !matches!(word.as_str(), "in" | "instanceof" | "of"),
        TokenKind::String(_) | TokenKind::Number | TokenKind::PrivateName => true,
        TokenKind::Punct(p) => matches!(*p, "{" | "++" | "--"),
        _ => false,
    }
}
