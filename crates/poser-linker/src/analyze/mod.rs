// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! File analysis: source text to a flat record of imports and exports.
//!
//! Each module type has its own analyzer:
//! - [`analyze_module`] walks ECMAScript module declarations
//! - [`analyze_script`] approximates CommonJS exports from assignment patterns
//! - [`analyze_wasm`] reads the export section of a WebAssembly binary
//! - JSON and native addons always export a single default

mod commonjs;
mod ecmascript;
mod wasm;

use indexmap::{IndexMap, IndexSet};

pub use commonjs::analyze_script;
pub use ecmascript::analyze_module;
pub use wasm::analyze_wasm;

/// A local definition backing an export.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocalName {
    /// Anonymous default export (`export default 42`)
    Default,
    /// Named local binding
    Name(String),
}

/// What an import pulls from its source module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imported {
    /// A single named export (`default` included)
    Name(String),
    /// The whole module namespace
    Namespace,
}

/// Where an export comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Defined in this module, or forwarded from one of its imports
    Local(LocalName),
    /// Re-exported directly from another module
    Reexport {
        /// Source module specifier
        specifier: String,
        /// What is re-exported
        imported: Imported,
    },
}

/// The flat result of analyzing one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileRecord {
    /// Imports: specifier to (local name to imported)
    pub imports: IndexMap<String, IndexMap<String, Imported>>,
    /// Exports: external name to origin
    pub exports: IndexMap<String, Origin>,
    /// Wildcard re-export specifiers
    pub wildcards: IndexSet<String>,
}

impl FileRecord {
    /// A record with a single anonymous default export.
    pub fn default_only() -> Self {
        let mut record = Self::default();
        record
            .exports
            .insert("default".to_owned(), Origin::Local(LocalName::Default));
        record
    }
}
