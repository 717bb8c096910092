// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Request id allocation.

use std::collections::BTreeSet;

use parking_lot::Mutex;

#[derive(Debug)]
struct Slots {
    next: u64,
    released: BTreeSet<u64>,
}

/// Bounded pool of request ids. The lowest free id is handed out first.
#[derive(Debug)]
pub struct IdPool {
    max: u64,
    slots: Mutex<Slots>,
}

impl IdPool {
    /// Creates a pool of the ids in `min..=max`. Ids are always positive.
    pub fn new(min: u64, max: u64) -> Self {
        Self {
            max,
            slots: Mutex::new(Slots {
                next: min.max(1),
                released: BTreeSet::new(),
            }),
        }
    }

    /// Takes an id, `None` when every id is in use.
    pub fn alloc(&self) -> Option<u64> {
        let mut slots = self.slots.lock();
        if let Some(id) = slots.released.pop_first() {
            return Some(id);
        }
        if slots.next > self.max {
            return None;
        }
        slots.next += 1;
        Some(slots.next - 1)
    }

    /// Returns an id to the pool.
    pub fn free(&self, id: u64) {
        let mut slots = self.slots.lock();
        if id < slots.next {
            slots.released.insert(id);
        }
    }
}
