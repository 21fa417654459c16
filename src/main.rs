// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relational_provisioner::{
    api::router,
    config::ServiceConfig,
    custody::{CustodyProvider, TurnkeyClient},
    health::HealthAggregator,
    provisioning::ProvisioningOrchestrator,
    state::AppState,
    storage::{AccountDatabase, JsonlAuditSink},
};

#[tokio::main]
async fn main() {
    init_tracing();

    let config = ServiceConfig::from_env();

    let custody: Arc<dyn CustodyProvider> = match TurnkeyClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "failed to configure Turnkey client");
            std::process::exit(1);
        }
    };

    let store = match AccountDatabase::open(&config.data_dir.join("accounts.redb")) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!(error = %e, "failed to open account database");
            std::process::exit(1);
        }
    };

    let audit = Arc::new(JsonlAuditSink::new(config.data_dir.join("audit")));

    let orchestrator = Arc::new(
        ProvisioningOrchestrator::new(
            custody.clone(),
            store.clone(),
            audit,
            config.enabled_chains.clone(),
        )
        .with_deadline(config.provision_deadline),
    );
    let health = Arc::new(HealthAggregator::new(custody, store.clone()));

    let state = AppState::new(orchestrator, store, health);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    info!(
        addr = %addr,
        chains = ?config.enabled_chains,
        "Relational Provisioner listening (docs at /docs)"
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .expect("HTTP server failed");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
