// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CLI argument parsing for poser.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// poser - Override module exports without editing module source
#[derive(Parser, Debug)]
#[command(name = "poser")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Loader configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show which exports of a module are bound and which are ambiguous
    Shape(ModuleArgs),

    /// List every export name visible from a module
    Names(ModuleArgs),

    /// Print the wrapper module generated for a pose
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
pub struct ModuleArgs {
    /// Module path or URL
    pub module: String,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Module path or URL
    pub module: String,

    /// Export names to pose
    #[arg(short, long, value_delimiter = ',')]
    pub pose: Vec<String>,

    /// Hide every export that is not posed
    #[arg(long)]
    pub full: bool,
}
