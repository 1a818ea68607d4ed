//! Rolegate command-line entry point.

#![forbid(unsafe_code)]

mod cli_config;

use std::future::Future;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rolegate_application::{
    AccessOptions, AccessRequestInput, AccessRequestOutcome, AccessRequestService,
    AccessRuleAuthority, AccessRuleCacheRepository, AccessRuleSyncReport, AccessRuleSyncService,
    AccessSelection,
};
use rolegate_core::{AppError, AppResult, DeploymentId};
use rolegate_infrastructure::{HttpAccessRuleAuthority, SqliteAccessRuleCache};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli_config::{CliConfig, init_tracing};

#[derive(Parser, Debug)]
#[command(
    name = "rolegate",
    version,
    about = "Request just-in-time cloud access through cached access rules"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh the local access rule cache
    Sync,
    /// List selectable accounts and roles
    Options {
        /// Only list roles granted together with this account
        #[arg(long)]
        account: Option<String>,
    },
    /// Request access to an account with a role
    Request {
        /// Account id to access
        #[arg(long)]
        account: String,
        /// Permission set label to assume
        #[arg(long)]
        role: String,
        /// Justification shown to reviewers
        #[arg(long)]
        reason: Option<String>,
        /// Requested duration in seconds, defaults to the rule maximum
        #[arg(long)]
        duration: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = CliConfig::load()?;
    let deployment_id = DeploymentId::from_base_url(config.deployment_url.as_str())?;

    let cache_path = config.cache_path(&deployment_id);
    let cache: Arc<dyn AccessRuleCacheRepository> =
        Arc::new(SqliteAccessRuleCache::open(cache_path.as_path()).await?);
    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let authority: Arc<dyn AccessRuleAuthority> = Arc::new(HttpAccessRuleAuthority::new(
        http_client,
        config.deployment_url.as_str(),
        config.api_token.clone(),
    )?);

    info!(
        deployment = %deployment_id,
        cache_path = %cache_path.display(),
        "rolegate started"
    );

    let cancellation = CancellationToken::new();
    listen_for_interrupt(cancellation.clone());

    let sync_service =
        AccessRuleSyncService::new(deployment_id, authority.clone(), cache.clone());
    let report = sync_service.sync(&cancellation).await?;

    let request_service = AccessRequestService::new(cache, authority);
    match cli.command {
        Command::Sync => print_sync_report(&report),
        Command::Options { account } => {
            let options = until_cancelled(
                &cancellation,
                request_service.access_options(account.as_deref()),
            )
            .await?;
            print_access_options(&options, account.as_deref());
        }
        Command::Request {
            account,
            role,
            reason,
            duration,
        } => {
            let request = request_service.request_access(AccessRequestInput {
                selection: AccessSelection {
                    account,
                    permission_set_label: role,
                },
                reason,
                duration_seconds: duration,
            });
            let outcome = until_cancelled(&cancellation, request).await?;
            print_request_outcome(&outcome);
        }
    }

    Ok(())
}

async fn until_cancelled<T>(
    cancellation: &CancellationToken,
    future: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    tokio::select! {
        biased;
        () = cancellation.cancelled() => Err(AppError::Cancelled(
            "interrupted before the command finished".to_owned(),
        )),
        result = future => result,
    }
}

fn listen_for_interrupt(cancellation: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, cancelling");
                cancellation.cancel();
            }
            Err(error) => warn!(error = %error, "failed to listen for interrupt signal"),
        }
    });
}

fn print_sync_report(report: &AccessRuleSyncReport) {
    println!(
        "synced access rules: {} created, {} updated, {} unchanged, {} skipped",
        report.created, report.updated, report.unchanged, report.skipped
    );
}

fn print_access_options(options: &AccessOptions, account: Option<&str>) {
    if account.is_none() {
        println!("accounts:");
        for account in &options.accounts {
            println!("  {account}");
        }
    }

    match account {
        Some(account) => println!("roles for account {account}:"),
        None => println!("roles:"),
    }
    for permission_set in &options.permission_sets {
        println!("  {permission_set}");
    }
}

fn print_request_outcome(outcome: &AccessRequestOutcome) {
    println!(
        "requested access via rule '{}' ({}) for {} seconds",
        outcome.plan.rule.name(),
        outcome.plan.rule.id(),
        outcome.plan.duration_seconds
    );
    for request in &outcome.requests {
        println!("  request {} is {}", request.id, request.status.as_str());
    }

    if outcome.is_active() {
        println!("access is active");
    } else {
        println!("access is not active yet");
    }
}
