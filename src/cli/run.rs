//! Plan, apply, show and destroy command implementations

use crate::cli::output::{
    format_applied_json, format_diagnostics, format_plan_json, format_plan_table,
    format_policy_set_json, format_policy_set_table, PolicySetView,
};
use crate::cli::{DestroyArgs, RunArgs};
use crate::config::{ConfigError, LogFormat, SyncConfig};
use crate::model::PolicySet;
use crate::reconciler::{Diagnostics, PolicySetReconciler};
use crate::remote::{ResolvedConnection, RestClient};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(args: &RunArgs) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    let mut config = SyncConfig::load(Some(&args.config))?;

    // Apply environment variable overrides
    config = config.with_env_overrides();

    // Apply CLI overrides (highest priority)
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(ref strategy) = args.filter_strategy {
        config.reconcile.filter_strategy =
            strategy.parse().map_err(|message| ConfigError::Validation {
                field: "reconcile.filter_strategy".to_string(),
                message,
            })?;
    }

    Ok(config)
}

/// Initialize tracing based on configuration
///
/// Logs go to stderr so that stdout carries only command output.
pub fn init_tracing(config: &crate::config::LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    if config.log_batch_bodies {
        eprintln!("WARNING: Batch body logging is enabled. Setting values will be logged.");
    }

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Build the reconciler for a validated configuration
pub fn build_reconciler(config: &SyncConfig) -> Result<PolicySetReconciler, Box<dyn std::error::Error>> {
    let conn = ResolvedConnection::from_env(&config.connection)?;
    let client = reqwest::Client::builder().timeout(conn.timeout()).build()?;

    tracing::debug!(base_url = %conn.base_url(), deployment = ?conn.deployment(), "Resolved connection");

    let service = RestClient::new(conn, Arc::new(client));
    Ok(
        PolicySetReconciler::new(Arc::new(service), config.reconcile.clone())
            .with_body_logging(config.logging.log_batch_bodies),
    )
}

/// Cancel the token on SIGINT or SIGTERM
fn cancel_on_signal(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for CTRL+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received SIGINT, stopping at the next remote call");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, stopping at the next remote call");
            }
        }

        cancel_token.cancel();
    });
}

struct Context {
    config: SyncConfig,
    desired: PolicySet,
    reconciler: PolicySetReconciler,
    cancel: CancellationToken,
}

fn prepare(args: &RunArgs) -> Result<Context, Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(args)?;
    config.validate()?;
    init_tracing(&config.logging)?;

    let desired = config.policy_set.to_desired()?;
    let reconciler = build_reconciler(&config)?;
    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    Ok(Context {
        config,
        desired,
        reconciler,
        cancel,
    })
}

fn print_warnings(warnings: &Diagnostics) {
    if !warnings.is_empty() {
        eprintln!("{}", format_diagnostics(warnings));
    }
}

/// Print the report and turn it into the command error.
fn failed(report: Diagnostics) -> Box<dyn std::error::Error> {
    eprintln!("{}", format_diagnostics(&report));
    let errors = report.errors().count();
    format!("{} error(s) reported", errors).into()
}

/// Handle `policyset plan`
pub async fn run_plan(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = prepare(&args)?;
    let planned = ctx
        .reconciler
        .plan(&ctx.desired, &ctx.cancel)
        .await
        .map_err(failed)?;

    if args.json {
        println!("{}", format_plan_json(&planned.plan, &planned.warnings)?);
    } else {
        print_warnings(&planned.warnings);
        println!("{}", format_plan_table(&planned.plan));
    }
    Ok(())
}

/// Handle `policyset apply`
pub async fn run_apply(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = prepare(&args)?;
    tracing::info!(
        policy_set = %ctx.config.policy_set.name,
        strategy = ?ctx.config.reconcile.filter_strategy,
        "Applying policy set"
    );

    let applied = ctx
        .reconciler
        .apply(&ctx.desired, &ctx.cancel)
        .await
        .map_err(failed)?;

    if args.json {
        println!("{}", format_applied_json(&applied)?);
    } else {
        print_warnings(&applied.warnings);
        println!("{}", format_plan_table(&applied.plan));
        println!();
        println!("{}", format_policy_set_table(&PolicySetView::from(&applied.state)));
    }
    Ok(())
}

/// Handle `policyset show`
pub async fn run_show(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = prepare(&args)?;
    let state = ctx
        .reconciler
        .refresh(&ctx.desired, &ctx.cancel)
        .await
        .map_err(failed)?;

    match state {
        Some(set) => {
            let view = PolicySetView::from(&set);
            if args.json {
                println!("{}", format_policy_set_json(&view)?);
            } else {
                println!("{}", format_policy_set_table(&view));
            }
            Ok(())
        }
        None => Err(format!("Policy set '{}' does not exist", ctx.desired.name).into()),
    }
}

/// Handle `policyset destroy`
pub async fn run_destroy(args: DestroyArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.yes {
        return Err("Refusing to destroy without --yes".into());
    }

    let ctx = prepare(&args.run)?;
    let warnings = ctx
        .reconciler
        .destroy(&ctx.desired, &ctx.cancel)
        .await
        .map_err(failed)?;

    print_warnings(&warnings);
    println!("✓ Policy set '{}' destroyed", ctx.desired.name);
    Ok(())
}
