// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chanlink - channel message delivery with push/pull failover.
//!
//! This is the binary entry point.

mod channels;
mod serve;
mod shutdown;

use std::path::PathBuf;

use chanlink_config::{ChanlinkConfig, ConfigError};
use chanlink_core::ChannelKind;
use clap::{Parser, Subcommand};

/// Chanlink - channel message delivery with push/pull failover.
#[derive(Parser, Debug)]
#[command(name = "chanlink", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP/WebSocket gateway.
    Serve,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Manage channels.
    Channels {
        /// Gateway base URL; defaults to the configured registry.
        #[arg(long, global = true)]
        remote: Option<String>,

        #[command(subcommand)]
        action: ChannelsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration, then print a summary.
    Check,
}

#[derive(Subcommand, Debug)]
enum ChannelsCommand {
    /// Create a channel.
    Create {
        name: String,
        /// general or topic.
        #[arg(long, default_value = "general")]
        kind: ChannelKind,
    },
    /// List channels that are not retired.
    List,
}

fn load_config(path: Option<&PathBuf>) -> Result<ChanlinkConfig, Vec<ConfigError>> {
    match path {
        Some(path) => chanlink_config::load_and_validate_path(path),
        None => chanlink_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            chanlink_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Config {
            action: ConfigCommand::Check,
        }) => {
            println!(
                "chanlink: config OK (backend={:?}, gateway={}:{}, poll_interval_ms={}, push_retry_count={})",
                config.storage.backend,
                config.gateway.host,
                config.gateway.port,
                config.delivery.poll_interval_ms,
                config.delivery.push_retry_count,
            );
            Ok(())
        }
        Some(Commands::Channels { remote, action }) => match action {
            ChannelsCommand::Create { name, kind } => {
                channels::create(&config, remote.as_deref(), &name, kind)
                    .await
                    .map(|channel| println!("{}", channels::format_channel(&channel)))
            }
            ChannelsCommand::List => channels::list(&config, remote.as_deref())
                .await
                .map(|list| {
                    for channel in &list {
                        println!("{}", channels::format_channel(channel));
                    }
                }),
        },
        None => {
            println!("chanlink: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
