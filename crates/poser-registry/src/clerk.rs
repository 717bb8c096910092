// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Protocol server for the registry.
//!
//! The clerk answers loader requests arriving over an [`Endpoint`]. Frames
//! are validated field by field; a frame that fails validation is logged
//! and dropped, which leaves the requester to time out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::Endpoint;
use crate::error::{Detail, RegistryError, Result};
use crate::registry::Registry;
use crate::wire::{MAX_ID, Response};

/// Serves a [`Registry`] to loaders.
#[derive(Debug)]
pub struct Clerk<V = Value> {
    registry: Arc<Registry<V>>,
    installed: AtomicBool,
}

impl<V: Clone + Send + Sync + 'static> Clerk<V> {
    /// Creates a clerk for a registry.
    pub fn new(registry: Arc<Registry<V>>) -> Self {
        Self {
            registry,
            installed: AtomicBool::new(false),
        }
    }

    /// The served registry.
    pub fn registry(&self) -> &Arc<Registry<V>> {
        &self.registry
    }

    /// Answers an ordinal request.
    ///
    /// The current pose moves from unloaded to loading, which protects it
    /// from being dropped by a later deposit before it is withdrawn.
    pub fn respond_ordinal(&self, id: u64, url: &str) -> Response {
        let ordinal = self.registry.claim(url);
        debug!(id, url, ?ordinal, "answered ordinal request");
        Response::Ordinal { id, ordinal }
    }

    /// Answers a facade request.
    pub fn respond_facade(&self, id: u64, url: &str, ordinal: u64) -> Result<Response> {
        let (names, full) = self.registry.describe(url, ordinal)?;
        debug!(id, url, ordinal, "answered facade request");
        Ok(Response::Facade { id, names, full })
    }

    /// Validates a raw frame and answers it.
    pub fn respond(&self, message: &Value) -> Result<Response> {
        let Some(fields) = message.as_object() else {
            return Err(RegistryError::Invalid(
                Detail::new("InvalidMessage")
                    .value(message)
                    .note("must be object"),
            ));
        };
        let id = fields
            .get("id")
            .and_then(Value::as_u64)
            .filter(|id| (1..=MAX_ID).contains(id))
            .ok_or_else(|| {
                RegistryError::Invalid(
                    Detail::new("InvalidRequestId")
                        .value(shown(fields.get("id")))
                        .note("must be positive integer"),
                )
            })?;

        match fields.get("type").and_then(Value::as_str) {
            Some("ordinal") => {
                let url = url_field(fields.get("url"))?;
                Ok(self.respond_ordinal(id, url))
            }
            Some("facade") => {
                let url = url_field(fields.get("url"))?;
                let ordinal = fields
                    .get("ordinal")
                    .and_then(Value::as_u64)
                    .filter(|ordinal| (1..=MAX_ID).contains(ordinal))
                    .ok_or_else(|| {
                        RegistryError::Invalid(
                            Detail::new("InvalidOrdinal")
                                .value(shown(fields.get("ordinal")))
                                .note("must be positive integer"),
                        )
                    })?;
                self.respond_facade(id, url, ordinal)
            }
            _ => Err(RegistryError::Invalid(
                Detail::new("UnrecognizedMessageType").value(shown(fields.get("type"))),
            )),
        }
    }

    /// Answers frames until the peer goes away.
    pub async fn serve(&self, mut endpoint: Endpoint) {
        while let Some(message) = endpoint.recv().await {
            let response = match self.respond(&message) {
                Ok(response) => response,
                Err(error) => {
                    warn!(%error, "dropped registry request");
                    continue;
                }
            };
            let sent = serde_json::to_value(&response)
                .map_err(|error| {
                    RegistryError::Invalid(
                        Detail::new("InvalidResponse").message(error.to_string()),
                    )
                })
                .and_then(|frame| endpoint.send(frame));
            if let Err(error) = sent {
                warn!(%error, "registry response was not delivered");
                break;
            }
        }
        debug!("registry endpoint closed");
    }

    /// Starts serving on a background task. A clerk serves one endpoint.
    pub fn install(self: &Arc<Self>, endpoint: Endpoint) -> Result<JoinHandle<()>> {
        if self.installed.swap(true, Ordering::SeqCst) {
            return Err(RegistryError::State(
                Detail::new("DoubleInstall").message("Attempted to install pose registry twice"),
            ));
        }
        info!("installed pose registry");
        let clerk = Arc::clone(self);
        Ok(tokio::spawn(async move { clerk.serve(endpoint).await }))
    }
}

fn url_field(value: Option<&Value>) -> Result<&str> {
    value
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            RegistryError::Invalid(
                Detail::new("InvalidModuleUrl")
                    .value(shown(value))
                    .note("must be URL string"),
            )
        })
}

fn shown(value: Option<&Value>) -> String {
    value.map_or_else(|| "undefined".to_owned(), Value::to_string)
}
