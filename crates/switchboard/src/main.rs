// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - queue routing and real-time presence for chat customer service.
//!
//! This is the binary entry point.

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use switchboard_config::SwitchboardConfig;

/// Switchboard - queue routing and real-time presence for chat customer service.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook intake, operator gateway, and reaper.
    Serve,
    /// Validate configuration and print a summary.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> SwitchboardConfig {
    let loaded = match path {
        Some(path) => switchboard_config::load_and_validate_path(path),
        None => switchboard_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            switchboard_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn print_summary(config: &SwitchboardConfig) {
    println!("switchboard: configuration is valid");
    println!(
        "  server      {}:{} (log_level={})",
        config.server.bind_address, config.server.port, config.server.log_level
    );
    println!(
        "  auth        webhook token {}, operator token {}",
        if config.server.webhook_token.is_some() { "set" } else { "unset" },
        if config.server.operator_token.is_some() { "set" } else { "unset (operator API disabled)" },
    );
    println!("  storage     {}", config.storage.database_path);
    println!("  evolution   {}", config.evolution.base_url);
    for instance in &config.evolution.instances {
        println!("    instance  {} (bot {})", instance.name, instance.bot_id);
    }
    println!(
        "  reaper      {} every {}s",
        if config.reaper.enabled { "enabled" } else { "disabled" },
        config.reaper.interval_secs
    );
    if let Some(dept) = config.routing.default_department.as_deref() {
        println!("  routing     default department `{dept}`");
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => print_summary(&config),
        None => {
            println!("switchboard: use --help for available commands");
        }
    }
}
