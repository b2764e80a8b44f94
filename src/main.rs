//! Janitor - instance reconciliation and readiness gRPC service

use std::sync::Arc;

use clap::Parser;
use kube::Client;
use tokio::signal;
use tracing::{error, info};

use janitor::config::Config;
use janitor::gitlab::GitlabClient;
use janitor::kube_client::KubeClusterApi;
use janitor::server::Services;
use janitor::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // kube and reqwest both negotiate TLS through rustls; pick the provider once
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install rustls crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let config = Config::parse();
    init_telemetry(config.log_format)?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;
    let cluster = Arc::new(KubeClusterApi::new(client));

    let repository = Arc::new(GitlabClient::new(
        &config.gitlab_url,
        &config.gitlab_token,
        config.gitlab_timeout(),
    )?);
    info!(gitlab = %config.gitlab_url, "configured GitLab client");

    Services::new(cluster, repository)
        .serve(config.listen_addr(), shutdown_signal())
        .await?;

    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining in-flight calls");
}
