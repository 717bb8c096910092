// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Token definitions for the declaration scanner.

/// A span in the source code, representing a range of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A token produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The span in the source code
    pub span: Span,
    /// Whether a line terminator precedes this token
    pub newline_before: bool,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span, newline_before: bool) -> Self {
        Self {
            kind,
            span,
            newline_before,
        }
    }

    /// Returns the identifier text if this is an identifier or keyword.
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true if this token is the given identifier or keyword.
    pub fn is_ident(&self, text: &str) -> bool {
        self.ident() == Some(text)
    }

    /// Returns true if this token is the given punctuator.
    pub fn is_punct(&self, text: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == text)
    }

    /// Returns the decoded value if this is a string literal.
    pub fn string(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns true if an expression may end with this token.
    pub(crate) fn ends_expression(&self) -> bool {
        match &self.kind {
            TokenKind::Identifier(name) => !is_operator_keyword(name),
            TokenKind::String(_)
            | TokenKind::Template
            | TokenKind::Number
            | TokenKind::RegExp
            | TokenKind::PrivateName => true,
            TokenKind::Punct(p) => matches!(*p, ")" | "]" | "}" | "++" | "--"),
            TokenKind::Eof => false,
        }
    }
}

/// The different kinds of tokens.
///
/// Keywords are reported as identifiers. Declarations are recognized by the
/// walkers, which only care about a handful of words.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword
    Identifier(String),
    /// String literal, escapes decoded
    String(String),
    /// Template literal, including any substitutions
    Template,
    /// Numeric literal
    Number,
    /// Regular expression literal
    RegExp,
    /// Private name (`#field`)
    PrivateName,
    /// Punctuator
    Punct(&'static str),
    /// End of input
    Eof,
}

/// Punctuators ordered longest first so the scanner can match greedily.
pub(crate) const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", ":", ".", "~", "?",
    "<", ">", "=", "!", "+", "-", "*", "/", "%", "&", "|", "^", "@",
];

/// Keywords after which an expression is still expected.
pub(crate) fn is_operator_keyword(word: &str) -> bool {
    matches!(
        word,
        "await"
            | "case"
            | "delete"
            | "do"
            | "else"
            | "in"
            | "instanceof"
            | "new"
            | "of"
            | "return"
            | "throw"
            | "typeof"
            | "void"
            | "yield"
    )
}

/// Reserved words that can never be used as a binding name.
pub fn is_reserved_word(word: &str) -> bool {
    matches!(
        word,
        "await"
            | "break"
            | "case"
            | "catch"
            | "class"
            | "const"
            | "continue"
            | "debugger"
            | "default"
            | "delete"
            | "do"
            | "else"
            | "enum"
            | "export"
            | "extends"
            | "false"
            | "finally"
            | "for"
            | "function"
            | "if"
            | "implements"
            | "import"
            | "in"
            | "instanceof"
            | "interface"
            | "let"
            | "new"
            | "null"
            | "package"
            | "private"
            | "protected"
            | "public"
            | "return"
            | "static"
            | "super"
            | "switch"
            | "this"
            | "throw"
            | "true"
            | "try"
            | "typeof"
            | "var"
            | "void"
            | "while"
            | "with"
            | "yield"
    )
}
