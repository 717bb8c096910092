// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Pose tags on module URLs.
//!
//! A resolved URL is tagged with a query parameter carrying the pose
//! ordinal, so every pose of a module gets its own module instance. Only
//! the query is parsed. Nothing is decoded or validated, and the parameter
//! operations always act on the last parameter of a name, leaving the rest
//! of the URL byte for byte intact.

use std::fmt;

use poser_registry::Detail;

use crate::error::{LoaderError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Parameter {
    name: String,
    value: Option<String>,
}

/// A URL split into essence, query parameters and fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleUrl {
    essence: String,
    parameters: Vec<Parameter>,
    fragment: Option<String>,
}

impl ModuleUrl {
    /// Splits a URL. A `?` after the first `#` belongs to the fragment.
    pub fn parse(url: &str) -> Self {
        let (rest, fragment) = match url.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_owned())),
            None => (url, None),
        };
        let (essence, query) = match rest.split_once('?') {
            Some((essence, query)) => (essence, Some(query)),
            None => (rest, None),
        };
        let parameters = query
            .map(|query| {
                query
                    .split('&')
                    .map(|entry| match entry.split_once('=') {
                        Some((name, value)) => Parameter {
                            name: name.to_owned(),
                            value: Some(value.to_owned()),
                        },
                        None => Parameter {
                            name: entry.to_owned(),
                            value: None,
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            essence: essence.to_owned(),
            parameters,
            fragment,
        }
    }

    /// The URL without query or fragment.
    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// The fragment, without `#`.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Appends a parameter.
    pub fn add(&mut self, name: impl Into<String>, value: Option<String>) -> &mut Self {
        self.parameters.push(Parameter {
            name: name.into(),
            value,
        });
        self
    }

    /// Value of the last parameter named `name`. A parameter without `=`
    /// has no value.
    pub fn get(&self, name: &str) -> Result<Option<&str>> {
        let index = self.last(name)?;
        Ok(self.parameters[index].value.as_deref())
    }

    /// Removes the last parameter named `name`.
    pub fn delete(&mut self, name: &str) -> Result<&mut Self> {
        let index = self.last(name)?;
        self.parameters.remove(index);
        Ok(self)
    }

    fn last(&self, name: &str) -> Result<usize> {
        self.parameters
            .iter()
            .rposition(|parameter| parameter.name == name)
            .ok_or_else(|| LoaderError::Missing(Detail::new("MissingParameter").value(name)))
    }
}

impl fmt::Display for ModuleUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        for (index, parameter) in self.parameters.iter().enumerate() {
            f.write_str(if index == 0 { "?" } else { "&" })?;
            f.write_str(&parameter.name)?;
            if let Some(value) = &parameter.value {
                write!(f, "={value}")?;
            }
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Tags `url` with a pose ordinal, or as unposed when there is none.
pub fn tag(url: &str, parameter: &str, ordinal: Option<u64>) -> String {
    let mut url = ModuleUrl::parse(url);
    url.add(parameter, Some(ordinal.map(|n| n.to_string()).unwrap_or_default()));
    url.to_string()
}
