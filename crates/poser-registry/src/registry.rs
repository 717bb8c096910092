// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Pose storage.
//!
//! Every posed module has a stack of numbered poses. Depositing pushes a new
//! current pose; withdrawing hands a pose's facade to the wrapper module that
//! asked for it. Poses that are no longer current are dropped once consumed.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Detail, RegistryError, Result};

/// Default URL wrapper modules import `withdraw` from.
pub const WITHDRAW_URL: &str = "poser:withdraw";

/// Lifecycle of a single pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseState {
    /// Deposited but not yet requested by a loader
    Unloaded,
    /// A loader has been told about it
    Loading,
    /// A wrapper module has withdrawn its facade
    Loaded,
}

/// One override of a module's exports.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose<V> {
    /// Replacement values by export name
    pub facade: IndexMap<String, V>,
    /// Whether unposed exports are hidden
    pub full: bool,
    /// Lifecycle state
    pub state: PoseState,
}

/// The poses of one module.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseStack<V> {
    /// Ordinal of the newest pose
    pub current: u64,
    /// Live poses by ordinal
    pub poses: BTreeMap<u64, Pose<V>>,
}

/// Catalog of poses keyed by target module URL.
#[derive(Debug)]
pub struct Registry<V = Value> {
    modules: Mutex<HashMap<String, PoseStack<V>>>,
    internal_prefix: Option<String>,
    withdraw_url: String,
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self {
            modules: Mutex::new(HashMap::new()),
            internal_prefix: None,
            withdraw_url: WITHDRAW_URL.to_owned(),
        }
    }
}

impl<V: Clone> Registry<V> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses poses of URLs starting with `prefix`.
    pub fn with_internal_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.internal_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Refuses poses of the module wrappers withdraw from, `poser:withdraw`
    /// unless set here.
    pub fn with_withdraw_url(mut self, url: impl Into<String>) -> Self {
        self.withdraw_url = url.into();
        self
    }

    fn is_internal(&self, url: &str) -> bool {
        url == self.withdraw_url
            || self
                .internal_prefix
                .as_deref()
                .is_some_and(|prefix| url.starts_with(prefix))
    }

    /// Records a new pose of `url` and returns its ordinal.
    ///
    /// `None` exports clear the facade. A full pose replaces the prior
    /// facade; a partial pose is merged over it.
    pub fn deposit(&self, url: &str, exports: Option<IndexMap<String, V>>, full: bool) -> Result<u64> {
        if url.is_empty() {
            return Err(RegistryError::Invalid(
                Detail::new("InvalidSpecifier")
                    .value("\"\"")
                    .note("must be nonempty string"),
            ));
        }
        if self.is_internal(url) {
            return Err(RegistryError::Permission(
                Detail::new("ForbiddenPose")
                    .label(url)
                    .note("internal files may not be posed"),
            ));
        }

        let mut modules = self.modules.lock();
        let ordinal = match modules.get_mut(url) {
            Some(module) => {
                let prior = module.poses.get(&module.current);
                let prior_facade = prior.map(|pose| pose.facade.clone()).unwrap_or_default();
                if prior.is_some_and(|pose| pose.state != PoseState::Loading) {
                    module.poses.remove(&module.current);
                }
                module.current += 1;
                let facade = match exports {
                    None => IndexMap::new(),
                    Some(exports) if full => exports,
                    Some(exports) => {
                        let mut merged = prior_facade;
                        merged.extend(exports);
                        merged
                    }
                };
                module.poses.insert(
                    module.current,
                    Pose {
                        facade,
                        full,
                        state: PoseState::Unloaded,
                    },
                );
                module.current
            }
            None => {
                let pose = Pose {
                    facade: exports.unwrap_or_default(),
                    full,
                    state: PoseState::Unloaded,
                };
                modules.insert(
                    url.to_owned(),
                    PoseStack {
                        current: 1,
                        poses: BTreeMap::from([(1, pose)]),
                    },
                );
                1
            }
        };

        info!(url, ordinal, full, "deposited pose");
        Ok(ordinal)
    }

    /// Takes the facade of a pose for the wrapper module evaluating it.
    pub fn withdraw(&self, url: &str, ordinal: u64) -> Result<IndexMap<String, V>> {
        let mut modules = self.modules.lock();
        let module = modules.get_mut(url).ok_or_else(|| {
            RegistryError::Missing(Detail::new("MissingModule").label(url))
        })?;
        let current = module.current;
        let pose = module.poses.get_mut(&ordinal).ok_or_else(|| {
            RegistryError::Missing(Detail::new("MissingPose").label(url).value(ordinal))
        })?;
        pose.state = PoseState::Loaded;
        let facade = pose.facade.clone();
        if ordinal != current {
            module.poses.remove(&ordinal);
        }
        debug!(url, ordinal, "withdrew pose");
        Ok(facade)
    }

    /// Current ordinal of `url`, marking an unloaded pose as loading.
    pub(crate) fn claim(&self, url: &str) -> Option<u64> {
        let mut modules = self.modules.lock();
        let module = modules.get_mut(url)?;
        if let Some(pose) = module.poses.get_mut(&module.current)
            && pose.state == PoseState::Unloaded
        {
            pose.state = PoseState::Loading;
        }
        Some(module.current)
    }

    /// Export names and mode of a pose.
    pub(crate) fn describe(&self, url: &str, ordinal: u64) -> Result<(Vec<String>, bool)> {
        let modules = self.modules.lock();
        let module = modules
            .get(url)
            .ok_or_else(|| RegistryError::Missing(Detail::new("MissingModule").value(url)))?;
        let pose = module.poses.get(&ordinal).ok_or_else(|| {
            RegistryError::Missing(Detail::new("MissingOrdinal").label(url).value(ordinal))
        })?;
        Ok((pose.facade.keys().cloned().collect(), pose.full))
    }

    /// Copy of the poses of `url`.
    pub fn snapshot(&self, url: &str) -> Option<PoseStack<V>> {
        self.modules.lock().get(url).cloned()
    }

    /// Current ordinal of `url`.
    pub fn current(&self, url: &str) -> Option<u64> {
        self.modules.lock().get(url).map(|module| module.current)
    }
}
