// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Fresh identifiers for generated modules.

const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Endless sequence `$a` .. `$Z`, `$aa` .. `$aZ`, `$ba` .. `$ZZ`, `$aaa` ..
#[derive(Debug, Clone, Default)]
pub struct Identifiers {
    prefix: Vec<usize>,
    index: usize,
}

impl Identifiers {
    /// Starts a new sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// The next identifier of the sequence.
    pub fn fresh(&mut self) -> String {
        let mut identifier = String::with_capacity(self.prefix.len() + 2);
        identifier.push('$');
        identifier.extend(self.prefix.iter().map(|&digit| ALPHABET[digit] as char));
        identifier.push(ALPHABET[self.index] as char);

        if self.index + 1 == ALPHABET.len() {
            self.advance_prefix();
            self.index = 0;
        } else {
            self.index += 1;
        }
        identifier
    }

    fn advance_prefix(&mut self) {
        for digit in self.prefix.iter_mut().rev() {
            if *digit + 1 < ALPHABET.len() {
                *digit += 1;
                return;
            }
            *digit = 0;
        }
        self.prefix.push(0);
    }
}

impl Iterator for Identifiers {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        Some(self.fresh())
    }
}
