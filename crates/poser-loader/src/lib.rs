// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # poser-loader
//!
//! Loader hooks that swap posed modules for generated wrapper modules.
//!
//! ## Overview
//!
//! A pose overrides some exports of a module. When a posed module is
//! loaded, the loader:
//! 1. analyzes the authentic module's export shape with `poser-linker`
//! 2. asks the registry which names are posed
//! 3. checks the pose against the shape and decides what to forward
//! 4. generates a wrapper module exporting the posed values
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use poser_loader::{Client, Config, Loader};
//! use poser_registry::{Clerk, Registry, channel};
//!
//! let registry = Arc::new(Registry::new());
//! let (loader_end, registry_end) = channel();
//! Arc::new(Clerk::new(registry.clone())).install(registry_end)?;
//!
//! let config = Config::from_env();
//! let client = Client::connect(loader_end, &config);
//! let loader = Loader::new(FsHost::current()?, client, config);
//! let url = loader.resolve("./dep.mjs", Some("file:///project/index.mjs")).await?;
//! let wrapper = loader.load(&url).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod facade;
pub mod generate;
pub mod hooks;
pub mod identifiers;
pub mod query;
pub mod tag;

pub use config::Config;
pub use error::{LoaderError, Result};
pub use facade::{Assay, Facade, assay, fit};
pub use generate::Generator;
pub use hooks::{LoadResult, Loader};
pub use identifiers::Identifiers;
pub use query::Client;
pub use tag::{ModuleUrl, tag};
