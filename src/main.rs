// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! banter CLI entry point

use clap::Parser;
use std::sync::Arc;

use banter::backup::{export_sessions, import_sessions};
use banter::catalog::{AiModel, ModelKind, ProviderKind};
use banter::chat::{ConfigPurpose, Session, SessionConfig, SessionController};
use banter::cli::{BackupCommand, Cli, Commands, ProvidersCommand, QuickArgs};
use banter::config::Settings;
use banter::llm::adapters::adapter_for;
use banter::store::{JsonSessionStore, SessionStore};
use banter::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG takes precedence over -v
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if cli.verbose > 0 {
        for directive in ["banter=debug"] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings = Settings::load()?;
    Settings::ensure_directories()?;

    match cli.command {
        Commands::Quick(args) => run_quick(args, &settings).await,
        Commands::Providers { command } => run_providers(command, &settings).await,
        Commands::Backup { command } => run_backup(command, &settings),
    }
}

async fn run_quick(args: QuickArgs, settings: &Settings) -> Result<()> {
    let kind = settings.resolve_kind(args.provider.as_deref())?;
    let provider = settings.build_provider(kind)?;

    let mut config = SessionConfig::new(provider).with_stream(settings.defaults.stream);
    config.purpose = ConfigPurpose::Quick;
    if args.no_stream {
        config.stream = false;
    }
    if let Some(code) = args.model {
        config.model = config
            .provider
            .chat_models()
            .find(|m| m.code == code)
            .cloned()
            .unwrap_or_else(|| AiModel::chat(code.clone(), code));
    }

    let mut controller = SessionController::new(Session::quick(config)).with_autogen_titles(false);
    controller.send(args.prompt, vec![]).await?;
    controller.wait_for_idle().await;

    let session = controller.session();
    let session = session.lock().await;
    if !session.error_message.is_empty() {
        eprintln!("error: {}", session.error_message);
        std::process::exit(1);
    }
    if let Some(group) = session.groups().last() {
        println!("{}", group.active().content);
    }
    Ok(())
}

async fn run_providers(command: ProvidersCommand, settings: &Settings) -> Result<()> {
    match command {
        ProvidersCommand::List => {
            for kind in [
                ProviderKind::OpenAi,
                ProviderKind::Anthropic,
                ProviderKind::Google,
            ] {
                let configured = settings.api_key_for(kind).is_some();
                let status = if configured { "configured" } else { "no API key" };
                println!("{:<12} {}", kind.name(), status);
                for model in kind.default_models() {
                    let tag = match model.kind {
                        ModelKind::Chat => "chat",
                        ModelKind::Image => "image",
                    };
                    println!("    {:<36} [{}]", model.code, tag);
                }
            }
            Ok(())
        }
        ProvidersCommand::Test { provider, model } => {
            let kind = settings.resolve_kind(provider.as_deref())?;
            let record = settings.build_provider(kind)?;
            let adapter = adapter_for(&record);

            let target = match model {
                Some(code) => record
                    .chat_models()
                    .find(|m| m.code == code)
                    .cloned()
                    .unwrap_or_else(|| AiModel::chat(code.clone(), code)),
                None => record.chat_model.clone(),
            };

            if adapter.test_model(&target).await {
                println!("{} ({}): ok", record.name, target.code);
                Ok(())
            } else {
                eprintln!("{} ({}): unreachable", record.name, target.code);
                std::process::exit(1);
            }
        }
        ProvidersCommand::Refresh { provider } => {
            let kind = settings.resolve_kind(provider.as_deref())?;
            let mut record = settings.build_provider(kind)?;
            let adapter = adapter_for(&record);

            let fetched = adapter.refresh_models().await;
            let added = record.merge_models(fetched);
            println!("{}: {} models ({} new)", record.name, record.models.len(), added);
            for model in &record.models {
                println!("    {}", model.code);
            }
            Ok(())
        }
    }
}

fn run_backup(command: BackupCommand, settings: &Settings) -> Result<()> {
    let store: Arc<dyn SessionStore> = Arc::new(JsonSessionStore::open_default()?);

    match command {
        BackupCommand::Export { out } => {
            let sessions = store.load_all()?;
            let json = export_sessions(&sessions)?;
            std::fs::write(&out, json)?;
            println!("exported {} session(s) to {}", sessions.len(), out.display());
            Ok(())
        }
        BackupCommand::Import { path } => {
            let kind = settings.resolve_kind(None)?;
            let provider = settings.build_provider(kind)?;

            let json = std::fs::read_to_string(&path)?;
            let sessions = import_sessions(&json, &provider)?;
            for session in &sessions {
                store.save(session)?;
            }
            println!("imported {} session(s)", sessions.len());
            Ok(())
        }
    }
}
