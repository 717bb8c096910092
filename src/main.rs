// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! poser - Override module exports without editing module source
//!
//! This is the main entry point for the poser CLI. It inspects module
//! export shapes and previews the wrapper modules poses produce.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use owo_colors::OwoColorize;
use poser_loader::Config;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };

    match &cli.command {
        Commands::Shape(args) => commands::shape(&args.module).await,
        Commands::Names(args) => commands::names(&args.module).await,
        Commands::Generate(args) => {
            commands::generate(&args.module, &args.pose, args.full, config).await
        }
    }
}
