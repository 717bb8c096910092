// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Ordered duplex channel between a loader and the registry.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Detail, RegistryError, Result};

/// Sending half of an endpoint.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Value>,
}

impl Outbox {
    /// Sends a frame to the peer.
    pub fn send(&self, frame: Value) -> Result<()> {
        self.tx.send(frame).map_err(|_| {
            RegistryError::State(
                Detail::new("ChannelClosed").message("Peer endpoint was dropped"),
            )
        })
    }
}

/// Receiving half of an endpoint.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Value>,
}

impl Inbox {
    /// Next frame from the peer, `None` once the peer is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

/// One end of a channel.
#[derive(Debug)]
pub struct Endpoint {
    outbox: Outbox,
    inbox: Inbox,
}

impl Endpoint {
    /// Sends a frame to the peer.
    pub fn send(&self, frame: Value) -> Result<()> {
        self.outbox.send(frame)
    }

    /// Next frame from the peer.
    pub async fn recv(&mut self) -> Option<Value> {
        self.inbox.recv().await
    }

    /// Splits into halves that can live in different tasks.
    pub fn split(self) -> (Outbox, Inbox) {
        (self.outbox, self.inbox)
    }
}

/// Creates a connected pair of endpoints.
pub fn channel() -> (Endpoint, Endpoint) {
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();
    let left = Endpoint {
        outbox: Outbox { tx: left_tx },
        inbox: Inbox { rx: left_rx },
    };
    let right = Endpoint {
        outbox: Outbox { tx: right_tx },
        inbox: Inbox { rx: right_rx },
    };
    (left, right)
}
