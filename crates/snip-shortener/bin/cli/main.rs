mod cli;
mod config;

use crate::cli::{Cli, Command, LogFormat};
use crate::config::Settings;
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use snip_shortener::{BatchRequest, OwnerId, ShortCode, Shortener, ShortenerService};
use snip_storage::{Backend, Repository};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Serialize)]
struct BatchLine {
    correlation_id: String,
    short_url: String,
}

#[derive(Serialize)]
struct UserUrl {
    short_url: String,
    original_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.log_format);

    let settings = Settings::resolve(&cli.global)?;
    let backend = Arc::new(
        Backend::from_config(&settings.storage)
            .await
            .context("failed to open storage backend")?,
    );
    info!(backend = backend.kind(), base_url = %settings.base_url, "storage ready");

    let (service, worker) = ShortenerService::with_worker(Arc::clone(&backend));
    let outcome = run(&service, &settings.base_url, cli.command).await;

    // dropping the service closes the deletion queue so the worker can drain
    drop(service);
    worker.join().await;
    backend
        .close()
        .await
        .context("failed to close storage backend")?;

    outcome
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

async fn run<S: Shortener>(service: &S, base_url: &str, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url, owner } => {
            let owner = match owner {
                Some(owner) => OwnerId::new(owner),
                None => {
                    let owner = OwnerId::new(Uuid::new_v4().to_string());
                    info!(owner = %owner, "no owner given, using a fresh one");
                    owner
                }
            };

            let outcome = service.shorten(&url, &owner).await?;
            let short_url = outcome.code().to_url(base_url);
            if outcome.is_created() {
                println!("{short_url}");
            } else {
                println!("{short_url} (already exists)");
            }
        }
        Command::Batch { file, owner } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read batch file {}", file.display()))?;
            let requests: Vec<BatchRequest> = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse batch file {}", file.display()))?;

            let lines: Vec<BatchLine> = service
                .shorten_batch(requests, &OwnerId::new(owner))
                .await?
                .into_iter()
                .map(|response| BatchLine {
                    correlation_id: response.correlation_id,
                    short_url: response.short_code.to_url(base_url),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&lines)?);
        }
        Command::Resolve { code } => {
            let code = ShortCode::new(code)?;
            println!("{}", service.resolve(&code).await?);
        }
        Command::List { owner } => {
            let urls: Vec<UserUrl> = service
                .user_urls(&OwnerId::new(owner))
                .await?
                .into_iter()
                .map(|record| UserUrl {
                    short_url: record.short_code.to_url(base_url),
                    original_url: record.original_url,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&urls)?);
        }
        Command::Delete { owner, codes } => {
            let codes = codes
                .into_iter()
                .map(ShortCode::new)
                .collect::<Result<Vec<_>, _>>()?;
            let count = codes.len();
            service.delete_urls(codes, &OwnerId::new(owner)).await?;
            println!("accepted deletion of {count} short code(s)");
        }
        Command::Ping => {
            service.ping().await?;
            println!("ok");
        }
    }

    Ok(())
}
