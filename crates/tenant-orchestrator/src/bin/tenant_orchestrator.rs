//! Tenant orchestrator binary.
//!
//! Wires the registry, cluster client and command runner once at start-up
//! and serves the HTTP surface until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tenant_orchestrator::config::LogFormat;
use tenant_orchestrator::server::{self, AppState};
use tenant_orchestrator::{
    Config, Dependencies, GitChartSource, HealthAggregator, KubeCluster, Orchestrator,
    PgTenantRegistry, ProcessRunner, TenantRegistry,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::default();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,tenant_orchestrator=info"))
        .context("Invalid log filter")?;
    let subscriber = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => subscriber.with(fmt::layer().json()).init(),
        LogFormat::Text => subscriber.with(fmt::layer()).init(),
    }

    info!(
        kubernetes_env = config.kubernetes_env.as_str(),
        base_domain = %config.base_domain,
        "Starting tenant orchestrator..."
    );

    let database_url = config
        .database_url
        .clone()
        .context("DATABASE_URL environment variable is required")?;
    let tenants = Arc::new(
        PgTenantRegistry::connect(&database_url, config.database_max_connections)
            .await
            .context("Failed to connect to tenant registry")?,
    );

    let kube_client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    info!("Connected to Kubernetes");

    audit_transient_tenants(tenants.as_ref()).await;

    let config = Arc::new(config);
    let registry: Arc<dyn TenantRegistry> = tenants.clone();
    let cluster = Arc::new(KubeCluster::new(kube_client));
    let runner = Arc::new(ProcessRunner::new());
    let charts = Arc::new(GitChartSource::new(
        runner.clone(),
        config.tools.git.clone(),
        config.charts.clone(),
    ));

    let orchestrator = Orchestrator::new(Dependencies {
        registry: registry.clone(),
        cluster: cluster.clone(),
        runner,
        charts,
        config: config.clone(),
    });
    let state = AppState {
        config: config.clone(),
        registry: registry.clone(),
        cluster: cluster.clone(),
        health: Arc::new(
            HealthAggregator::new(registry, cluster).with_workflows(orchestrator.clone()),
        ),
        orchestrator,
    };

    let app = server::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!(port = config.port, "Tenant orchestrator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped; closing registry connections");
    tenants.close().await;
    Ok(())
}

/// Warn about tenants a previous process left mid-workflow.
async fn audit_transient_tenants(registry: &dyn TenantRegistry) {
    const PAGE_SIZE: u32 = 100;
    let mut page = 1;
    loop {
        let listing = match registry.list(page, PAGE_SIZE).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "Start-up tenant audit failed");
                return;
            }
        };
        for tenant in listing.records.iter().filter(|t| t.status.is_transient()) {
            warn!(
                company_code = %tenant.company_code,
                status = %tenant.status,
                updated_at = %tenant.updated_at,
                "Tenant left in a transient status by a previous run; redrive it manually"
            );
        }
        if u64::from(page) * u64::from(PAGE_SIZE) >= listing.total || listing.records.is_empty() {
            return;
        }
        page += 1;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
