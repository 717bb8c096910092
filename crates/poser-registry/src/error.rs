// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the pose registry
//!
//! Errors are classified by what went wrong (invalid input, a missing
//! entry, a forbidden operation and so on). Each carries a [`Detail`] with a
//! stable code. The loader reuses [`Detail`] for its own errors.

use std::fmt;

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Context attached to a classified error.
///
/// Renders as `Code: message |label| <value>: note`, with absent parts
/// omitted and line breaks replaced so the text stays on one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detail {
    /// Stable error code, such as `ForbiddenPose`
    pub code: &'static str,
    /// Human readable description
    pub message: Option<String>,
    /// What the error is about, such as a module URL
    pub label: Option<String>,
    /// The offending value
    pub value: Option<String>,
    /// Constraint the value violated
    pub note: Option<String>,
}

impl Detail {
    /// Creates a detail with only a code.
    pub fn new(code: &'static str) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    /// Sets the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the value.
    pub fn value(mut self, value: impl fmt::Display) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Sets the note.
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut main = Vec::new();
        if let Some(message) = &self.message {
            main.push(message.clone());
        }
        if let Some(label) = &self.label {
            main.push(format!("|{label}|"));
        }
        if let Some(value) = &self.value {
            main.push(format!("<{value}>"));
        }

        let mut text = self.code.to_owned();
        if !main.is_empty() {
            text.push_str(": ");
            text.push_str(&main.join(" "));
        }
        if let Some(note) = &self.note {
            text.push_str(": ");
            text.push_str(note);
        }
        f.write_str(&text.replace(['\n', '\r'], "\u{23ce}"))
    }
}

/// Errors that can occur while depositing, withdrawing or serving poses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Malformed input
    #[error("InvalidError {0}")]
    Invalid(Detail),

    /// A value that must be unique was repeated
    #[error("DuplicateError {0}")]
    Duplicate(Detail),

    /// A required entry does not exist
    #[error("MissingError {0}")]
    Missing(Detail),

    /// The operation is not allowed
    #[error("PermissionError {0}")]
    Permission(Detail),

    /// The operation is not allowed in the current state
    #[error("StateError {0}")]
    State(Detail),

    /// An operation took too long
    #[error("TimeLimitError {0}")]
    TimeLimit(Detail),

    /// A finite resource ran out
    #[error("ExhaustionError {0}")]
    Exhaustion(Detail),

    /// The operation is not supported
    #[error("UnsupportedError {0}")]
    Unsupported(Detail),
}

impl RegistryError {
    /// The detail of the error.
    pub fn detail(&self) -> &Detail {
        match self {
            Self::Invalid(detail)
            | Self::Duplicate(detail)
            | Self::Missing(detail)
            | Self::Permission(detail)
            | Self::State(detail)
            | Self::TimeLimit(detail)
            | Self::Exhaustion(detail)
            | Self::Unsupported(detail) => detail,
        }
    }

    /// The stable error code.
    pub fn code(&self) -> &'static str {
        self.detail().code
    }
}
