// Copyright (c) 2025 the replypilot authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod autopilot;
mod browser;
mod cleanup;
mod cli;
mod config;
mod constants;
mod error;
mod filter;
mod greeting;
mod history;
mod injector;
mod llm;
mod logger;
mod page;
mod reputation;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::autopilot::AutopilotSession;
use crate::browser::CdpSession;
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::constants::DEFAULT_CONFIG_FILE;
use crate::history::HistoryStore;
use crate::llm::{OllamaClient, ReplyBackend};
use crate::logger::Logger;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    // Configuration problems must surface before a browser is launched.
    let config = Config::load(&config_path)?;
    if let Err(err) = config.validate() {
        bail!("{}", err.friendly_message());
    }

    let running = Arc::new(AtomicBool::new(true));
    let stop_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nInterrupted. Finishing the current step, then stopping.");
        stop_flag.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    match cli.command {
        Commands::Check => {
            let client = OllamaClient::new()?;
            match client.list_models(&config).await {
                Ok(models) => {
                    println!("Backend reachable at {}.", config.base_url);
                    if models.is_empty() {
                        println!("No models installed; pull one first.");
                    } else {
                        println!("Available models:");
                        for model in &models {
                            let marker = if *model == config.model { " (configured)" } else { "" };
                            println!("  {}{}", model, marker);
                        }
                        if !models.iter().any(|m| *m == config.model) {
                            println!(
                                "Configured model '{}' is not in the list above.",
                                config.model
                            );
                        }
                    }
                    Ok(())
                }
                Err(err) => bail!("{}", err.friendly_message()),
            }
        }
        Commands::Run { max_comments } => {
            let (mut session, cdp) =
                build_session(&config, &config_path, running, max_comments).await?;
            let result = session.run().await;
            cdp.close().await;
            result
        }
        Commands::Once => {
            let (mut session, cdp) = build_session(&config, &config_path, running, None).await?;
            let result = session.run_once().await;
            cdp.close().await;
            result
        }
    }
}

async fn build_session(
    config: &Config,
    config_path: &PathBuf,
    running: Arc<AtomicBool>,
    max_comments: Option<u32>,
) -> Result<(AutopilotSession, CdpSession)> {
    let logger = match config.log_file.as_deref() {
        Some(path) => Some(Logger::new(path)?),
        None => None,
    };
    let history = HistoryStore::load(&config.history_file)?;
    let backend = OllamaClient::new()?;

    let cdp = CdpSession::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.friendly_message()))?;

    let session = AutopilotSession::new(
        running,
        cdp.host_page(),
        Box::new(backend),
        history,
        logger,
        config_path.clone(),
        max_comments,
    );
    Ok((session, cdp))
}
