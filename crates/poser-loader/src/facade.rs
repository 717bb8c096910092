// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Matching a pose against the shape of the module it overrides.

use indexmap::IndexSet;
use poser_linker::Shape;
use poser_registry::Detail;

use crate::error::{LoaderError, Result};

/// The export names a pose overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facade {
    /// Posed export names, in deposit order
    pub names: IndexSet<String>,
    /// Whether unposed exports are hidden
    pub full: bool,
}

impl Facade {
    /// Creates a facade from names.
    pub fn new<I, S>(names: I, full: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            full,
        }
    }
}

/// What a wrapper module must forward from the authentic module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assay {
    /// The authentic default export is forwarded
    pub default: bool,
    /// Some authentic named export is forwarded
    pub named: bool,
    /// Nothing is forwarded, the authentic module is only evaluated
    pub envelop: bool,
    /// Bound names the pose leaves alone
    pub relay: IndexSet<String>,
    /// Names the authentic module exports ambiguously
    pub ambiguous: IndexSet<String>,
}

/// Checks that every posed name is an unambiguous export of the module.
pub fn fit(shape: &Shape, facade: &Facade) -> Result<()> {
    for name in &facade.names {
        if shape.ambiguous.contains(name) {
            return Err(LoaderError::Invalid(
                Detail::new("AmbiguousPose")
                    .label(name)
                    .note("ambiguous exports may not be posed"),
            ));
        }
        if !shape.bound.contains(name) {
            return Err(LoaderError::Invalid(
                Detail::new("PhantomPose")
                    .label(name)
                    .note("undefined exports may not be posed"),
            ));
        }
    }
    Ok(())
}

/// Decides what a wrapper module forwards.
pub fn assay(shape: &Shape, facade: &Facade) -> Assay {
    let posed = |name: &String| facade.names.contains(name);
    let default = !facade.names.contains("default")
        && (shape.bound.contains("default") || shape.ambiguous.contains("default"));
    let named = shape
        .bound
        .iter()
        .chain(&shape.ambiguous)
        .any(|name| name != "default" && !posed(name));
    let relay = shape.bound.iter().filter(|name| !posed(name)).cloned().collect();

    Assay {
        default,
        named,
        envelop: !(default || named),
        relay,
        ambiguous: shape.ambiguous.clone(),
    }
}
