// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # Poser Registry
//!
//! The process-wide catalog of export overrides ("poses") and the server
//! half of the protocol loaders use to consult it.
//!
//! - [`Registry`] stores numbered poses per target module URL
//! - [`Poser`] is the public posing API
//! - [`Clerk`] answers loader requests over a [`channel`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod clerk;
pub mod error;
pub mod poser;
pub mod registry;
pub mod wire;

pub use channel::{Endpoint, Inbox, Outbox, channel};
pub use clerk::Clerk;
pub use error::{Detail, RegistryError, Result};
pub use poser::{Poser, Resolve};
pub use registry::{Pose, PoseStack, PoseState, Registry, WITHDRAW_URL};
pub use wire::{Request, Response};
