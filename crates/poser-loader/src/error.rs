// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the loader

use poser_linker::LinkerError;
use poser_registry::{Detail, RegistryError};
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while resolving or loading a posed module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    /// Malformed input, an unusable pose or a malformed registry response
    #[error("InvalidError {0}")]
    Invalid(Detail),

    /// A registry response repeated a name
    #[error("DuplicateError {0}")]
    Duplicate(Detail),

    /// A required URL parameter does not exist
    #[error("MissingError {0}")]
    Missing(Detail),

    /// The registry did not answer in time
    #[error("TimeLimitError {0}")]
    TimeLimit(Detail),

    /// Every request id is in use
    #[error("ExhaustionError {0}")]
    Exhaustion(Detail),

    /// Module analysis or linking failed
    #[error(transparent)]
    Linker(#[from] LinkerError),

    /// The registry refused an operation
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl LoaderError {
    /// Stable error code, if the error carries one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Invalid(detail)
            | Self::Duplicate(detail)
            | Self::Missing(detail)
            | Self::TimeLimit(detail)
            | Self::Exhaustion(detail) => Some(detail.code),
            Self::Registry(error) => Some(error.code()),
            Self::Linker(LinkerError::Invalid { code, .. }) => Some(code),
            Self::Linker(_) => None,
        }
    }

    /// The detail of a classified error.
    pub fn detail(&self) -> Option<&Detail> {
        match self {
            Self::Invalid(detail)
            | Self::Duplicate(detail)
            | Self::Missing(detail)
            | Self::TimeLimit(detail)
            | Self::Exhaustion(detail) => Some(detail),
            Self::Registry(error) => Some(error.detail()),
            Self::Linker(_) => None,
        }
    }
}
