// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Codedeck Control CLI
//!
//! Drives the container lifecycle from a terminal.
//!
//! Usage:
//!   codedeck-ctl solve --problem <id> --question <id> [--language c]
//!   codedeck-ctl heartbeat [--problem <id>] [--language c]
//!   codedeck-ctl token

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codedeck_protocol::HeartbeatRequest;
use codedeck_sdk::storage::load_token;
use codedeck_sdk::{
    ChannelResync, ClientStorage, FileStorage, HttpBackend, LifecycleBackend, LifecycleService,
    MemoryStorage, SdkConfig, SessionToken, SetupHandle, SetupOutcome, SetupRequest,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "codedeck-ctl", version, about = "Codedeck container lifecycle CLI")]
struct Cli {
    /// REST base URL (overrides CODEDECK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a session, follow container status and keep heartbeats running until Ctrl-C
    Solve {
        #[arg(long)]
        problem: String,
        #[arg(long)]
        question: String,
        #[arg(long, default_value = "c")]
        language: String,
    },
    /// Send one heartbeat and print the outcome
    Heartbeat {
        #[arg(long)]
        problem: Option<String>,
        #[arg(long, default_value = "c")]
        language: String,
    },
    /// Print the stored session token
    Token,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codedeck_sdk=info,codedeck_ctl=info".into()),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();

    let mut config = SdkConfig::from_env().context("failed to load configuration")?;
    if let Some(api_url) = cli.api_url {
        config = config.with_api_url(api_url);
        if let Ok(status_url) = std::env::var("CODEDECK_STATUS_URL") {
            config = config.with_status_url(status_url);
        }
    }

    match cli.command {
        Command::Solve {
            problem,
            question,
            language,
        } => {
            let request = SetupRequest::new(problem)
                .with_question_id(question)
                .with_language(language);
            solve(config, request).await
        }
        Command::Heartbeat { problem, language } => heartbeat(&config, problem, language).await,
        Command::Token => token(&config),
    }
}

fn open_storage(config: &SdkConfig) -> Result<Arc<dyn ClientStorage>> {
    Ok(match &config.storage_path {
        Some(path) => Arc::new(
            FileStorage::open(path.clone())
                .with_context(|| format!("failed to open storage at {}", path.display()))?,
        ),
        None => Arc::new(MemoryStorage::new()),
    })
}

async fn solve(config: SdkConfig, request: SetupRequest) -> Result<()> {
    let storage = open_storage(&config)?;
    let mut first_session = true;

    loop {
        let (resync, mut resync_rx) = ChannelResync::channel();
        let service = LifecycleService::builder(config.clone())
            .storage(storage.clone())
            .resync(Arc::new(resync))
            .build()?;

        if let Some(url) = service.take_redirect_url()? {
            println!("container moved to {}", url);
        }

        service.start_heartbeats()?;

        if first_session {
            first_session = false;
            let handle = service.setup_codebase(request.clone())?;
            println!("session started with {}", handle.pending_token());
            tokio::spawn(report_setup(handle));
        } else {
            service
                .scheduler()
                .set_problem_context(request.problem_id.clone(), Some(&request.language));
        }

        let follower = service.follow_status()?;
        let mut status = follower.status();

        let resynced = loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break false,

                Some(event) = resync_rx.recv() => {
                    info!(container_url = %event.container_url, "Reinitializing session");
                    break true;
                }

                Ok(()) = status.changed() => {
                    if let Some(current) = status.borrow_and_update().as_ref() {
                        match &current.message {
                            Some(message) => {
                                println!("container {}: {}", current.state.as_str(), message)
                            }
                            None => println!("container {}", current.state.as_str()),
                        }
                    }
                }
            }
        };

        service.shutdown();
        follower.close().await;

        if !resynced {
            return Ok(());
        }
    }
}

async fn report_setup(handle: SetupHandle) {
    match handle.outcome().await {
        Ok(SetupOutcome::Provisioned {
            token,
            container_url,
        }) => {
            println!("provisioning requested, token {}", token);
            if let Some(url) = container_url {
                println!("container url {}", url);
            }
        }
        Ok(SetupOutcome::Unconfirmed { .. }) => {
            println!("provisioning accepted, keeping pending token");
        }
        Ok(SetupOutcome::Failed(reason)) => println!("setup failed: {}", reason),
        Err(e) => warn!(error = %e, "Provisioning task did not finish"),
    }
}

async fn heartbeat(config: &SdkConfig, problem: Option<String>, language: String) -> Result<()> {
    let backend = HttpBackend::new(config)?;
    let request = match problem {
        Some(problem) => HeartbeatRequest::for_problem(problem, language),
        None => HeartbeatRequest::default(),
    };

    let response = backend
        .heartbeat(&request)
        .await
        .context("heartbeat failed")?;

    println!("status: {:?}", response.status);
    if let Some(url) = response.container_url() {
        println!("container url: {}", url);
    }
    Ok(())
}

fn token(config: &SdkConfig) -> Result<()> {
    let storage = open_storage(config)?;
    match load_token(storage.as_ref())? {
        Some(SessionToken::Pending(token)) => println!("pending {}", token),
        Some(SessionToken::Confirmed(token)) => println!("confirmed {}", token),
        None => println!("no token stored"),
    }
    Ok(())
}
