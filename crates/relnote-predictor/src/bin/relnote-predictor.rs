//! Release note prediction service binary.
//!
//! Standalone HTTP service for GitHub issue and pull request webhooks.

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relnote_predictor::config::{
    Config, ReconcilerConfig, DEFAULT_GITHUB_API_URL, DEFAULT_PORT,
    DEFAULT_PREDICTION_TIMEOUT_SECS, DEFAULT_PREDICTION_URL,
};
use relnote_predictor::handlers::Dispatcher;
use relnote_predictor::server::{self, AppState};
use relnote_predictor::{GitHubClient, HttpClassifier, Reconciler};

#[derive(Parser, Debug)]
#[command(name = "relnote-predictor")]
#[command(about = "Predicts whether release notes describe bugs and keeps kind/bug in sync")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// GitHub token used for label and comment calls
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// File containing the GitHub token, takes precedence over the token
    #[arg(long)]
    github_token_file: Option<PathBuf>,

    /// Webhook secret for X-Hub-Signature-256 verification
    #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
    hmac_secret: Option<String>,

    /// File containing the webhook secret, takes precedence over the secret
    #[arg(long)]
    hmac_secret_file: Option<PathBuf>,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_GITHUB_API_URL)]
    github_api_url: String,

    /// Prediction endpoint
    #[arg(long, env = "PREDICTION_URL", default_value = DEFAULT_PREDICTION_URL)]
    prediction_url: String,

    /// Host header override for the prediction request
    #[arg(long, env = "PREDICTION_HOST")]
    prediction_host: Option<String>,

    /// Prediction request timeout in seconds
    #[arg(
        long,
        env = "PREDICTION_TIMEOUT_SECS",
        default_value_t = DEFAULT_PREDICTION_TIMEOUT_SECS
    )]
    prediction_timeout_secs: u64,

    /// Only log label and comment changes
    #[arg(
        long,
        env = "DRY_RUN",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    dry_run: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let github_token = match &self.github_token_file {
            Some(path) => Some(read_secret(path)?),
            None => self.github_token,
        };
        let webhook_secret = match &self.hmac_secret_file {
            Some(path) => Some(read_secret(path)?),
            None => self.hmac_secret,
        };

        Ok(Config {
            port: self.port,
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()),
            github_token: github_token.filter(|s| !s.is_empty()),
            github_api_url: self.github_api_url,
            dry_run: self.dry_run,
            prediction_url: self.prediction_url,
            prediction_host: self.prediction_host.filter(|s| !s.is_empty()),
            prediction_timeout: Duration::from_secs(self.prediction_timeout_secs),
            reconciler: ReconcilerConfig::default(),
        })
    }
}

fn read_secret(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read secret file {}", path.display()))?;
    Ok(contents.trim().to_string())
}

fn init_tracing() -> Result<()> {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let (json_layer, text_layer) = if json {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(EnvFilter::from_default_env().add_directive("relnote_predictor=info".parse()?))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("Starting release note prediction service...");

    let config = Args::parse().into_config()?;
    info!(?config, "Loaded configuration");

    if config.webhook_secret.is_none() {
        warn!("No webhook secret configured - signature verification is disabled");
    }
    if config.github_token.is_none() {
        warn!("No GitHub token configured - GitHub API calls will fail");
    }
    if config.dry_run {
        info!("Dry run enabled - labels and comments will not be changed");
    }

    let github = GitHubClient::new(config.github_token.as_deref().unwrap_or_default())
        .context("Failed to create GitHub client")?
        .with_api_base(&config.github_api_url)
        .with_dry_run(config.dry_run);

    let classifier = HttpClassifier::new(
        config.prediction_url.clone(),
        config.prediction_host.clone(),
        config.prediction_timeout,
    )
    .context("Failed to create prediction client")?;
    info!(endpoint = %classifier.endpoint(), "Prediction client configured");

    let reconciler = Reconciler::new(
        Arc::new(github),
        Arc::new(classifier),
        config.reconciler.clone(),
    );

    let state = AppState {
        config,
        dispatcher: Dispatcher::new(reconciler),
    };

    server::run_server(state).await
}
