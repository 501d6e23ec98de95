mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::SyncConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use views::{
    DemoQueryApi, GitHubSync, HistoryOutcome, QueryApi, RemoteQueryApi, SyncReport, TokenQuery,
};

#[derive(Parser)]
#[command(name = "quota-cli")]
struct Args {
    #[arg(long, default_value = "config")]
    config_file: String,

    /// Use the built-in demo service instead of the remote one.
    #[arg(long)]
    demo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the quota summary and one page of usage history for a key.
    Query {
        key: String,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    #[command(subcommand)]
    Sync(SyncCommand),
}

#[derive(Subcommand)]
enum SyncCommand {
    Status,
    Run,
    Show,
    Save {
        #[arg(long)]
        token: String,

        #[arg(long)]
        repo: String,

        #[arg(long, default_value = "")]
        interval: String,
    },
}

#[derive(Deserialize)]
struct CliConfig {
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn load_config(config_file: &str) -> Result<CliConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(config_file).required(false))
        .add_source(config::Environment::default())
        .build()?;
    let cfg: CliConfig = settings.try_deserialize()?;
    Ok(cfg)
}

fn build_api(args: &Args) -> Result<Arc<dyn QueryApi>> {
    if args.demo {
        log::info!("Running in DEMO mode");
        return Ok(Arc::new(DemoQueryApi::new()));
    }
    let cfg = load_config(&args.config_file)?;
    let client = remote::new_client(
        &cfg.api_base_url,
        cfg.access_token,
        Duration::from_secs(cfg.request_timeout_secs),
    )?;
    log::info!("Querying {}", client.base_url());
    Ok(Arc::new(RemoteQueryApi { client }))
}

async fn run_query(api: Arc<dyn QueryApi>, key: &str, page: u32) -> Result<()> {
    let lookup = TokenQuery::new(api);
    if let Err(e) = lookup.lookup(key).await {
        anyhow::bail!(report::failure_line(&e));
    }

    if page != 1 {
        match lookup.load_history(page).await {
            HistoryOutcome::OutOfRange => {
                let total = lookup.snapshot().await.page.total_pages().max(1);
                log::warn!("page {page} is out of range, showing page 1 of {total}");
            }
            outcome => log::debug!("ledger page {page}: {outcome:?}"),
        }
    }

    let view = lookup.snapshot().await;
    println!("{}", report::summary(&view));
    println!();
    println!("{}", report::ledger(&view));
    Ok(())
}

async fn run_sync(api: Arc<dyn QueryApi>, command: SyncCommand) -> Result<()> {
    let panel = GitHubSync::new(api);
    match command {
        SyncCommand::Status => {
            println!("{}", report::sync_status(panel.load_status().await.as_ref()));
        }
        SyncCommand::Show => {
            let config = panel
                .load_config()
                .await
                .map_err(|e| anyhow::anyhow!(report::failure_line(&e)))?;
            println!("{}", report::sync_config(&config));
        }
        SyncCommand::Save {
            token,
            repo,
            interval,
        } => {
            let config = SyncConfig {
                token,
                repo,
                interval,
            };
            panel
                .save_config(&config)
                .await
                .map_err(|e| anyhow::anyhow!(report::failure_line(&e)))?;
            println!("{}", views::github_sync::CONFIG_SAVED);
        }
        SyncCommand::Run => {
            let config = panel
                .load_config()
                .await
                .map_err(|e| anyhow::anyhow!(report::failure_line(&e)))?;
            match panel.trigger_sync(&config).await {
                Ok(SyncReport::Completed { message, status }) => {
                    println!("{message}");
                    println!("{}", report::sync_status(status.as_ref()));
                }
                Ok(SyncReport::AlreadyRunning) => println!("a sync is already running"),
                Err(e) => anyhow::bail!(report::failure_line(&e)),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("quota_cli=info"));

    let args = Args::parse();
    let api = build_api(&args)?;

    match args.command {
        Command::Query { key, page } => run_query(api, &key, page).await,
        Command::Sync(command) => run_sync(api, command).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_with_page() {
        let args = Args::try_parse_from(["quota-cli", "query", "sk-demo", "--page", "3"]).unwrap();
        match args.command {
            Command::Query { key, page } => {
                assert_eq!(key, "sk-demo");
                assert_eq!(page, 3);
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn parses_sync_save() {
        let args = Args::try_parse_from([
            "quota-cli",
            "--demo",
            "sync",
            "save",
            "--token",
            "ghp_x",
            "--repo",
            "acme/backup",
        ])
        .unwrap();
        assert!(args.demo);
        match args.command {
            Command::Sync(SyncCommand::Save {
                token,
                repo,
                interval,
            }) => {
                assert_eq!(token, "ghp_x");
                assert_eq!(repo, "acme/backup");
                assert_eq!(interval, "");
            }
            _ => panic!("expected sync save"),
        }
    }

    #[tokio::test]
    async fn demo_query_succeeds() {
        let api: Arc<dyn QueryApi> = Arc::new(DemoQueryApi::new());
        run_query(api, "sk-demo", 2).await.unwrap();
    }

    #[tokio::test]
    async fn demo_query_unknown_key_fails() {
        let api: Arc<dyn QueryApi> = Arc::new(DemoQueryApi::new());
        let err = run_query(api, "sk-nope", 1).await.unwrap_err();
        assert_eq!(err.to_string(), "error: token not found");
    }

    #[tokio::test]
    async fn demo_sync_run_needs_saved_config() {
        let api: Arc<dyn QueryApi> = Arc::new(DemoQueryApi::new());
        assert!(run_sync(api.clone(), SyncCommand::Run).await.is_err());
        run_sync(
            api.clone(),
            SyncCommand::Save {
                token: "ghp_x".to_string(),
                repo: "acme/backup".to_string(),
                interval: String::new(),
            },
        )
        .await
        .unwrap();
        run_sync(api, SyncCommand::Run).await.unwrap();
    }
}
