// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # poser-linker
//!
//! Static analysis of JavaScript module graphs.
//!
//! ## Overview
//!
//! This crate answers one question about a module without running it: which
//! export names does it provide, and does each name resolve to exactly one
//! binding? It covers:
//! - ECMAScript module declarations, CommonJS export heuristics, JSON,
//!   WebAssembly and native addons
//! - named, default, namespace and wildcard re-exports across both dialects
//! - cyclic re-exports and conflicting wildcard names
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use poser_linker::{FsHost, Linker};
//!
//! let linker = Linker::new(FsHost::current()?);
//! let id = linker.analyze_import("file:///project/index.mjs").await?;
//! let shape = linker.shape(id)?;
//! println!("{:?} {:?}", shape.bound, shape.ambiguous);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analyze;
pub mod error;
pub mod graph;
pub mod host;
pub mod lexer;
pub mod link;
pub mod module;
mod node;

// Re-exports for convenience
pub use error::{LinkerError, Result};
pub use graph::Linker;
pub use host::{FsHost, Host, Loaded, MemoryHost, Source};
pub use link::Resolution;
pub use module::{Binding, BindingId, Locator, Module, ModuleId, ModuleType, Shape};
