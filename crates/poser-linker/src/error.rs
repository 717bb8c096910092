// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module analysis and linking

use thiserror::Error;

/// Result type for linker operations
pub type Result<T> = std::result::Result<T, LinkerError>;

/// Errors that can occur while analyzing or linking a module graph.
///
/// Payloads are plain strings so the error is `Clone`. In-flight analyses
/// are shared between callers, and every caller receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkerError {
    /// Malformed source text
    #[error("SyntaxError: {message} (at offset {offset})")]
    Syntax {
        /// Description of the problem
        message: String,
        /// Byte offset into the source
        offset: usize,
    },

    /// Link-time failure, reported the way the module system itself would
    #[error("SyntaxError: {0}")]
    Link(String),

    /// A module or declaration shape that cannot be handled
    #[error("{code}: {message}")]
    Invalid {
        /// Stable error code
        code: &'static str,
        /// Description of the problem
        message: String,
    },

    /// Operation not supported for this kind of module
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A CommonJS module required an ECMAScript module
    #[error("Require of ECMAScript module {module} from CommonJS module {from}")]
    RequireEsm {
        /// The required ECMAScript module
        module: String,
        /// The requiring CommonJS module
        from: String,
    },

    /// Module not found
    #[error("Cannot find module '{specifier}' from '{parent}'")]
    ModuleNotFound {
        /// Specifier being resolved
        specifier: String,
        /// Module doing the resolving
        parent: String,
    },

    /// File system error
    #[error("File system error: {0}")]
    Io(String),
}

impl LinkerError {
    /// Create a new syntax error
    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            offset,
        }
    }

    /// Create a new invalid error
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            code,
            message: message.into(),
        }
    }

    /// Create a module not found error
    pub fn module_not_found(specifier: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::ModuleNotFound {
            specifier: specifier.into(),
            parent: parent.into(),
        }
    }

    /// A named path through re-exports led back to itself
    pub fn cycle(name: &str, specifier: &str) -> Self {
        Self::Link(format!(
            "Detected cycle while resolving name '{name}' in '{specifier}'"
        ))
    }

    /// A module does not export the requested name
    pub fn not_provided(specifier: &str, name: &str) -> Self {
        Self::Link(format!(
            "The requested module '{specifier}' does not provide an export named '{name}'"
        ))
    }

    /// Returns true for link-time failures the module system itself raises.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, Self::Link(_) | Self::Syntax { .. })
    }
}

impl From<std::io::Error> for LinkerError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for LinkerError {
    fn from(error: serde_json::Error) -> Self {
        Self::invalid("InvalidManifest", error.to_string())
    }
}
