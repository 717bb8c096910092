// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The scanner that produces tokens from source text.

use super::token::{PUNCTUATORS, Span, Token, TokenKind, is_operator_keyword};
use crate::error::{LinkerError, Result};

/// A scanner that tokenizes JavaScript source code.
///
/// Only enough of the lexical grammar is recognized to find module
/// declarations reliably: strings, templates, comments, regular expressions
/// and punctuators are all delimited correctly, while numbers and template
/// contents are skipped without being interpreted.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    regex_allowed: bool,
    newline: bool,
    /// One entry per open paren, set when it opens a statement head
    parens: Vec<bool>,
    after_head: bool,
    after_dot: bool,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            regex_allowed: true,
            newline: false,
            parens: Vec::new(),
            after_head: false,
            after_dot: false,
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Result<Token> {
        self.newline = false;
        self.skip_whitespace_and_comments()?;

        let start = self.current_pos;
        let newline = self.newline;

        let Some((_, ch)) = self.advance() else {
            return Ok(Token::new(TokenKind::Eof, Span::new(start, start), newline));
        };

        let kind = match ch {
            '"' | '\'' => TokenKind::String(self.scan_string(ch, start)?),
            '`' => {
                self.scan_template(start)?;
                TokenKind::Template
            }
            '0'..='9' => {
                self.scan_number();
                TokenKind::Number
            }
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.scan_number();
                TokenKind::Number
            }
            '#' => {
                self.scan_identifier_tail(&mut String::new())?;
                TokenKind::PrivateName
            }
            '/' if self.regex_allowed => {
                self.scan_regex(start)?;
                TokenKind::RegExp
            }
            '\\' => {
                let mut name = String::new();
                name.push(self.scan_unicode_escape(start)?);
                self.scan_identifier_tail(&mut name)?;
                TokenKind::Identifier(name)
            }
            _ if is_id_start(ch) => {
                let mut name = String::from(ch);
                self.scan_identifier_tail(&mut name)?;
                TokenKind::Identifier(name)
            }
            _ => TokenKind::Punct(self.scan_punct(start)?),
        };

        // `if (a) /re/` starts a statement, `f(a) / b` divides
        let closes_head = match &kind {
            TokenKind::Punct("(") => {
                self.parens.push(self.after_head);
                false
            }
            TokenKind::Punct(")") => self.parens.pop().unwrap_or(false),
            _ => false,
        };
        self.after_head = !self.after_dot
            && matches!(&kind, TokenKind::Identifier(name) if is_statement_head(name));
        self.after_dot = matches!(kind, TokenKind::Punct("." | "?."));

        self.regex_allowed = closes_head
            || match &kind {
                TokenKind::Identifier(name) => is_operator_keyword(name),
                TokenKind::Punct(p) => !matches!(*p, ")" | "]" | "++" | "--"),
                _ => false,
            };

        Ok(Token::new(kind, Span::new(start, self.current_pos), newline))
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> LinkerError {
        LinkerError::syntax(message, offset)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        if self.current_pos == 0 && self.source.starts_with("#!") {
            self.skip_line();
        }
        loop {
            match self.peek() {
                Some(ch) if is_line_terminator(ch) => {
                    self.newline = true;
                    self.advance();
                }
                Some(ch) if ch.is_whitespace() || ch == '\u{FEFF}' => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => self.skip_line(),
                    Some('*') => {
                        let start = self.current_pos;
                        self.advance();
                        self.advance();
                        let mut prev = ' ';
                        loop {
                            let Some((_, ch)) = self.advance() else {
                                return Err(self.error("Unterminated comment", start));
                            };
                            if is_line_terminator(ch) {
                                self.newline = true;
                            }
                            if prev == '*' && ch == '/' {
                                break;
                            }
                            prev = ch;
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        Ok(())
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.peek() {
            if is_line_terminator(ch) {
                break;
            }
            self.advance();
        }
    }

    fn scan_punct(&mut self, start: usize) -> Result<&'static str> {
        let rest = &self.source[start..];
        let found = PUNCTUATORS
            .iter()
            .copied()
            .filter(|p| rest.starts_with(p))
            // `a?.5:b` is a conditional, not optional chaining
            .find(|p| !(*p == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit())));
        let Some(punct) = found else {
            let ch = rest.chars().next().unwrap_or_default();
            return Err(self.error(format!("Unexpected character '{ch}'"), start));
        };
        for _ in 1..punct.len() {
            self.advance();
        }
        Ok(punct)
    }

    fn scan_string(&mut self, quote: char, start: usize) -> Result<String> {
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return Err(self.error("Unterminated string literal", start)),
                Some((_, ch)) if ch == quote => break,
                Some((_, '\n' | '\r')) => {
                    return Err(self.error("Unterminated string literal", start));
                }
                Some((_, '\\')) => {
                    let Some((_, escaped)) = self.advance() else {
                        return Err(self.error("Unterminated string literal", start));
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{C}'),
                        'v' => value.push('\u{B}'),
                        '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                            value.push('\0')
                        }
                        'x' => {
                            let code = self.scan_hex_digits(2, start)?;
                            value.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                        }
                        'u' => value.push(self.scan_unicode_escape_body(start)?),
                        '\r' => {
                            if self.peek() == Some('\n') {
                                self.advance();
                            }
                        }
                        '\n' | '\u{2028}' | '\u{2029}' => {}
                        _ => value.push(escaped),
                    }
                }
                Some((_, ch)) => value.push(ch),
            }
        }

        Ok(value)
    }

    fn scan_template(&mut self, start: usize) -> Result<()> {
        loop {
            match self.advance() {
                None => return Err(self.error("Unterminated template literal", start)),
                Some((_, '`')) => return Ok(()),
                Some((_, '\\')) => {
                    self.advance();
                }
                Some((_, '$')) if self.peek() == Some('{') => {
                    self.advance();
                    self.scan_substitution(start)?;
                }
                Some(_) => {}
            }
        }
    }

    fn scan_substitution(&mut self, start: usize) -> Result<()> {
        self.regex_allowed = true;
        let mut depth = 0usize;
        loop {
            let token = self.next_token()?;
            match token.kind {
                TokenKind::Eof => return Err(self.error("Unterminated template literal", start)),
                TokenKind::Punct("{") => depth += 1,
                TokenKind::Punct("}") if depth == 0 => return Ok(()),
                TokenKind::Punct("}") => depth -= 1,
                _ => {}
            }
        }
    }

    fn scan_regex(&mut self, start: usize) -> Result<()> {
        let mut in_class = false;
        loop {
            match self.advance() {
                None => return Err(self.error("Unterminated regular expression", start)),
                Some((_, ch)) if is_line_terminator(ch) => {
                    return Err(self.error("Unterminated regular expression", start));
                }
                Some((_, '\\')) => {
                    self.advance();
                }
                Some((_, '[')) => in_class = true,
                Some((_, ']')) => in_class = false,
                Some((_, '/')) if !in_class => break,
                Some(_) => {}
            }
        }
        while self.peek().is_some_and(is_id_continue) {
            self.advance();
        }
        Ok(())
    }

    fn scan_number(&mut self) {
        let mut prev = ' ';
        while let Some(ch) = self.peek() {
            let exponent_sign = matches!(ch, '+' | '-') && matches!(prev, 'e' | 'E');
            if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || exponent_sign) {
                break;
            }
            prev = ch;
            self.advance();
        }
    }

    fn scan_identifier_tail(&mut self, name: &mut String) -> Result<()> {
        loop {
            match self.peek() {
                Some(ch) if is_id_continue(ch) => {
                    name.push(ch);
                    self.advance();
                }
                Some('\\') => {
                    let start = self.current_pos;
                    self.advance();
                    name.push(self.scan_unicode_escape(start)?);
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_unicode_escape(&mut self, start: usize) -> Result<char> {
        match self.advance() {
            Some((_, 'u')) => self.scan_unicode_escape_body(start),
            _ => Err(self.error("Invalid escape in identifier", start)),
        }
    }

    fn scan_unicode_escape_body(&mut self, start: usize) -> Result<char> {
        let code = if self.peek() == Some('{') {
            self.advance();
            let mut code = 0u32;
            loop {
                match self.advance() {
                    Some((_, '}')) => break,
                    Some((_, ch)) if ch.is_ascii_hexdigit() => {
                        code = code.saturating_mul(16).saturating_add(ch.to_digit(16).unwrap_or(0));
                    }
                    _ => return Err(self.error("Invalid Unicode escape sequence", start)),
                }
            }
            code
        } else {
            self.scan_hex_digits(4, start)?
        };
        char::from_u32(code).ok_or_else(|| self.error("Invalid Unicode escape sequence", start))
    }

    fn scan_hex_digits(&mut self, count: usize, start: usize) -> Result<u32> {
        let mut code = 0u32;
        for _ in 0..count {
            match self.advance() {
                Some((_, ch)) if ch.is_ascii_hexdigit() => {
                    code = code * 16 + ch.to_digit(16).unwrap_or(0);
                }
                _ => return Err(self.error("Invalid hexadecimal escape sequence", start)),
            }
        }
        Ok(code)
    }
}

/// Tokenizes an entire source text. The final token is always `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = scanner.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// Keywords whose parenthesized head is followed by a statement.
fn is_statement_head(word: &str) -> bool {
    matches!(word, "if" | "while" | "for" | "with")
}

fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Checks if a character can start an identifier.
fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

/// Checks if a character can continue an identifier.
fn is_id_continue(ch: char) -> bool {
    ch == '$'
        || ch == '\u{200C}'
        || ch == '\u{200D}'
        || unicode_xid::UnicodeXID::is_xid_continue(ch)
}
