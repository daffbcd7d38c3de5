//! hsm-provision - batch key provisioning against a remote HSM
//!
//! Creates `<prefix>_0 .. <prefix>_(n-1)` key pairs in the HSM, derives each key's
//! address, and prints one line per verified key.
//!
//! # Examples
//!
//! ```bash
//! # Ten keys named node_0 .. node_9
//! HSM_API_TOKEN=... hsm-provision --url https://hsm.example.com --count 10 --prefix node
//!
//! # Same, driven entirely by the environment, with JSON output
//! HSM_URL=https://hsm.example.com HSM_API_TOKEN=... NUM_KEYS=10 KEY_PREFIX=node \
//!     hsm-provision --json
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use hsm_provision::config::{
    DEFAULT_HSM_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY,
};
use hsm_provision::{BatchOrchestrator, BatchReport, Config, HsmClient, RetryPolicy};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Provision HSM key pairs and report their addresses
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HSM REST API base URL
    #[arg(short, long, env = "HSM_URL", default_value = DEFAULT_HSM_URL)]
    url: String,

    /// Bearer token for the HSM REST API
    #[arg(long, env = "HSM_API_TOKEN", hide_env_values = true)]
    token: String,

    /// Number of keys to provision (at most 100)
    #[arg(short = 'n', long, env = "NUM_KEYS")]
    count: usize,

    /// Key label prefix; keys are named <prefix>_<index>
    #[arg(short, long, env = "KEY_PREFIX")]
    prefix: String,

    /// Attempts per HSM call when rate limited or the transport fails
    #[arg(long, env = "HSM_RETRY_ATTEMPTS", default_value_t = DEFAULT_RETRY_ATTEMPTS)]
    retry_attempts: u32,

    /// Delay between attempts in milliseconds
    #[arg(
        long,
        env = "HSM_RETRY_DELAY_MS",
        default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64
    )]
    retry_delay_ms: u64,

    /// Per-attempt request timeout in seconds (0 disables)
    #[arg(
        long,
        env = "HSM_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs()
    )]
    timeout_secs: u64,

    /// Print results as JSON instead of text
    #[arg(long)]
    json: bool,
}

impl Args {
    fn to_config(&self) -> Config {
        let timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));
        Config::new(&self.url, &self.token, self.count, &self.prefix)
            .with_retry(RetryPolicy::new(
                self.retry_attempts,
                Duration::from_millis(self.retry_delay_ms),
            ))
            .with_request_timeout(timeout)
    }
}

fn print_report(report: &BatchReport, requested: usize) {
    for result in &report.results {
        println!("{}", result);
    }

    println!();
    let summary = format!(
        "Provisioned {} of {} keys",
        report.results.len(),
        requested
    );
    if report.failures.is_empty() {
        println!("{}", summary.green().bold());
        return;
    }

    println!("{}", summary.yellow().bold());
    for failure in &report.failures {
        let line = format!(
            "  {} ({}): {}",
            failure.label, failure.stage, failure.error
        );
        if failure.error.is_integrity_failure() {
            println!("{}", line.red().bold());
        } else {
            println!("{}", line.red());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hsm_provision=info,hsm_provision_cli=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    let config = args.to_config();

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        eprintln!("{}", e.to_string().red());
        std::process::exit(1);
    }
    tracing::info!("Using HSM at {}", config.hsm_url);

    let client = HsmClient::from_config(&config)?;
    let orchestrator = BatchOrchestrator::new(Arc::new(client)).with_max_keys(config.max_keys);
    let report = orchestrator
        .provision_batch(&config.key_prefix, config.key_count)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.results)?);
    } else {
        print_report(&report, config.key_count);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_config() {
        let args = Args::try_parse_from([
            "hsm-provision",
            "--url",
            "https://hsm.example.com/",
            "--token",
            "t0k3n",
            "--count",
            "5",
            "--prefix",
            "node",
            "--retry-attempts",
            "4",
            "--retry-delay-ms",
            "250",
            "--timeout-secs",
            "0",
        ])
        .unwrap();
        let config = args.to_config();

        assert_eq!(config.hsm_url, "https://hsm.example.com");
        assert_eq!(config.api_token, "t0k3n");
        assert_eq!(config.key_count, 5);
        assert_eq!(config.key_prefix, "node");
        assert_eq!(
            config.retry,
            RetryPolicy::new(4, Duration::from_millis(250))
        );
        assert_eq!(config.request_timeout, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_match_library_constants() {
        let args = Args::try_parse_from([
            "hsm-provision",
            "--url",
            DEFAULT_HSM_URL,
            "--token",
            "t",
            "--count",
            "1",
            "--prefix",
            "node",
            "--retry-attempts",
            "3",
        ])
        .unwrap();
        let config = args.to_config();

        assert_eq!(args.retry_delay_ms, DEFAULT_RETRY_DELAY.as_millis() as u64);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.request_timeout, Some(DEFAULT_REQUEST_TIMEOUT));
    }

    #[test]
    fn test_count_over_maximum_fails_validation() {
        let args = Args::try_parse_from([
            "hsm-provision",
            "--token",
            "t",
            "--count",
            "101",
            "--prefix",
            "node",
        ])
        .unwrap();

        assert!(args.to_config().validate().is_err());
    }

    #[test]
    fn test_non_numeric_count_is_rejected() {
        let result = Args::try_parse_from([
            "hsm-provision",
            "--token",
            "t",
            "--count",
            "many",
            "--prefix",
            "node",
        ]);
        assert!(result.is_err());
    }
}
