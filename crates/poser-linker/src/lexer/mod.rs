// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lexical analysis for JavaScript source text.
//!
//! The scanner is shared by both file analyzers. It delimits every lexical
//! construct that could hide an `import` or `export` keyword (strings,
//! templates, comments, regular expressions) so the walkers only ever see
//! real declarations.

mod scanner;
mod token;

pub use scanner::{Scanner, tokenize};
pub use token::{Span, Token, TokenKind, is_reserved_word};
