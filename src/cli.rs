// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions for banter

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "banter", version, about = "A multi-provider LLM conversation engine")]
pub struct Cli {
    /// Increase verbosity (-v enables engine diagnostics)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a one-shot question in a transient quick session
    Quick(QuickArgs),

    /// Inspect and test configured providers
    Providers {
        #[command(subcommand)]
        command: ProvidersCommand,
    },

    /// Export or import session backups
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },
}

#[derive(Args)]
pub struct QuickArgs {
    /// The prompt to send
    pub prompt: String,

    /// Provider to use: openai, anthropic, or google
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model code override
    #[arg(short, long)]
    pub model: Option<String>,

    /// Disable streaming for this query
    #[arg(long)]
    pub no_stream: bool,
}

#[derive(Subcommand)]
pub enum ProvidersCommand {
    /// List configured providers and their models
    List,

    /// Probe a model with a minimal request
    Test {
        /// Provider to test (defaults to the configured default)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model code (defaults to the provider's chat model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Query a provider's model catalog
    Refresh {
        /// Provider to refresh (defaults to the configured default)
        #[arg(short, long)]
        provider: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Write all persisted sessions to a backup file
    Export {
        /// Output path
        #[arg(short, long, default_value = "banter-backup.json")]
        out: PathBuf,
    },

    /// Restore sessions from a backup file
    Import {
        /// Backup file to read
        path: PathBuf,
    },
}
