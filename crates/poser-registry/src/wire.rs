// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Messages exchanged between loaders and the registry.
//!
//! Frames travel as JSON values tagged by `type`. Both ends validate raw
//! frames field by field before trusting them, so these types describe
//! well-formed traffic only.

use serde::{Deserialize, Serialize};

/// Largest id a peer may use, so ids survive a round trip through a double.
pub const MAX_ID: u64 = (1 << 53) - 1;

/// A loader request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    /// Ask for the current ordinal of a module
    Ordinal {
        /// Correlation id
        id: u64,
        /// Target module URL
        url: String,
    },
    /// Ask for the export names of a pose
    Facade {
        /// Correlation id
        id: u64,
        /// Target module URL
        url: String,
        /// Pose ordinal
        ordinal: u64,
    },
}

impl Request {
    /// Correlation id of the request.
    pub fn id(&self) -> u64 {
        match self {
            Self::Ordinal { id, .. } | Self::Facade { id, .. } => *id,
        }
    }

    /// Message type, echoed by the response.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ordinal { .. } => "ordinal",
            Self::Facade { .. } => "facade",
        }
    }
}

/// A registry response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    /// Current ordinal, `None` when the module was never posed
    Ordinal {
        /// Correlation id
        id: u64,
        /// Current ordinal
        ordinal: Option<u64>,
    },
    /// Export names of a pose
    Facade {
        /// Correlation id
        id: u64,
        /// Posed export names
        names: Vec<String>,
        /// Whether unposed exports are hidden
        full: bool,
    },
}
