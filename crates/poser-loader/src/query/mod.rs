// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Requests from a loader to the registry.
//!
//! Every request carries an id from a bounded pool and waits for the
//! response with the same id, up to a timeout. Responses are routed by a
//! background task, so requests never wait on each other. A response for an
//! id nobody waits on anymore is logged and dropped.

mod pool;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use poser_registry::wire::MAX_ID;
use poser_registry::{Detail, Endpoint, Inbox, Outbox, Request};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{LoaderError, Result};
use crate::facade::Facade;

pub use pool::IdPool;

struct Inner {
    outbox: Outbox,
    pending: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    ids: IdPool,
    timeout: Duration,
}

/// Holds a request id and its pending entry until the request ends.
struct Ticket<'a> {
    inner: &'a Inner,
    id: u64,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.inner.pending.lock().remove(&self.id);
        self.inner.ids.free(self.id);
    }
}

/// Loader side of the registry protocol.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Connects over an endpoint whose peer is served by a registry clerk.
    ///
    /// Must be called within a tokio runtime; the response router runs as a
    /// task until the registry or every clone of the client goes away.
    pub fn connect(endpoint: Endpoint, config: &Config) -> Self {
        let (outbox, inbox) = endpoint.split();
        let inner = Arc::new(Inner {
            outbox,
            pending: Mutex::new(HashMap::new()),
            ids: IdPool::new(config.id_min, config.id_max),
            timeout: config.timeout(),
        });
        tokio::spawn(route(Arc::downgrade(&inner), inbox));
        Self { inner }
    }

    /// Number of requests awaiting a response.
    pub fn pending(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Current pose ordinal of a module, `None` if it was never posed.
    pub async fn query_ordinal(&self, url: &str) -> Result<Option<u64>> {
        let response = self
            .query(|id| Request::Ordinal {
                id,
                url: url.to_owned(),
            })
            .await?;
        match response.get("ordinal") {
            Some(Value::Null) => Ok(None),
            ordinal => ordinal
                .and_then(Value::as_u64)
                .filter(|ordinal| (1..=MAX_ID).contains(ordinal))
                .map(Some)
                .ok_or_else(|| {
                    LoaderError::Invalid(
                        Detail::new("InvalidOrdinal")
                            .value(shown(ordinal))
                            .note("must be positive integer"),
                    )
                }),
        }
    }

    /// Posed export names of pose `ordinal` of a module.
    pub async fn query_facade(&self, url: &str, ordinal: u64) -> Result<Facade> {
        let response = self
            .query(|id| Request::Facade {
                id,
                url: url.to_owned(),
                ordinal,
            })
            .await?;

        let Some(names) = response.get("names").and_then(Value::as_array) else {
            return Err(LoaderError::Invalid(
                Detail::new("InvalidFacade")
                    .value(shown(response.get("names")))
                    .note("must be array"),
            ));
        };
        let mut facade = Facade::default();
        for name in names {
            let Some(name) = name.as_str().filter(|name| !name.is_empty()) else {
                return Err(LoaderError::Invalid(
                    Detail::new("InvalidName")
                        .value(name)
                        .note("must be nonempty string"),
                ));
            };
            facade.names.insert(name.to_owned());
        }
        if facade.names.len() != names.len() {
            return Err(LoaderError::Duplicate(
                Detail::new("DuplicateName").message("Facade contained duplicate name"),
            ));
        }
        facade.full = response
            .get("full")
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                LoaderError::Invalid(
                    Detail::new("InvalidFull")
                        .value(shown(response.get("full")))
                        .note("must be boolean"),
                )
            })?;
        Ok(facade)
    }

    async fn query(&self, build: impl FnOnce(u64) -> Request) -> Result<Value> {
        let inner = &*self.inner;
        let id = inner.ids.alloc().ok_or_else(|| {
            LoaderError::Exhaustion(
                Detail::new("IdPoolExhausted").message("Exhausted available request IDs"),
            )
        })?;
        let _ticket = Ticket { inner, id };

        let request = build(id);
        let frame = serde_json::to_value(&request).map_err(|error| {
            LoaderError::Invalid(Detail::new("InvalidRequest").message(error.to_string()))
        })?;
        let (tx, rx) = oneshot::channel();
        inner.pending.lock().insert(id, tx);
        inner.outbox.send(frame)?;
        debug!(id, kind = request.kind(), "sent registry request");

        let response = match tokio::time::timeout(inner.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) | Err(_) => {
                return Err(LoaderError::TimeLimit(
                    Detail::new("RegistryTimeout")
                        .message("Registry never responded to loader request"),
                ));
            }
        };

        if response.get("type").and_then(Value::as_str) != Some(request.kind()) {
            return Err(LoaderError::Invalid(
                Detail::new("UnexpectedResponseType").value(shown(response.get("type"))),
            ));
        }
        Ok(response)
    }
}

/// Hands each response to the request waiting on its id.
async fn route(inner: Weak<Inner>, mut inbox: Inbox) {
    while let Some(message) = inbox.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let Some(id) = message.get("id").and_then(Value::as_u64) else {
            warn!(code = "InvalidMessage", %message, "dropped registry response");
            continue;
        };
        // the sender is gone when the request ended in the meantime
        let waiting = inner.pending.lock().remove(&id);
        match waiting {
            Some(tx) => {
                let _ = tx.send(message);
            }
            None => warn!(code = "UnrecognizedRequestId", id, "dropped registry response"),
        }
    }
    debug!("registry response router stopped");
}

fn shown(value: Option<&Value>) -> String {
    value.map_or_else(|| "undefined".to_owned(), Value::to_string)
}
