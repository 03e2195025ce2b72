// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Tracesession Server
//!
//! Lifecycle manager for ephemeral trace viewer sessions (Perfetto and
//! TraceLens). Sessions are records with a TTL; the viewer pods behind them
//! are created and torn down out of band by the provisioning worker.

pub mod api;
pub mod clusters;
pub mod config;
pub mod lifecycle;
pub mod mcp;
pub mod provisioner;

use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracesession_core::{Clock, SystemClock, ViewerType};
use tracesession_storage::build_registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{health_check, sessions_router, AppState};
use clusters::ClusterResolver;
use config::ServerConfig;
use lifecycle::{ManagerContext, PodDefaults, SessionManager};
use mcp::{register_session_tools, MCPServer, ToolRegistry};
use provisioner::{LoggingGateway, ProvisionerGateway, ProvisioningWorker};

/// A fully wired application: the router plus the state behind it.
pub struct App {
    pub router: Router,
    pub state: AppState,
}

/// Wire registry, provisioning worker, managers and routes.
///
/// Must be called inside a tokio runtime; the provisioning worker is spawned
/// here.
pub fn build_app(
    config: &ServerConfig,
    gateway: Arc<dyn ProvisionerGateway>,
    clock: Arc<dyn Clock>,
) -> Result<App> {
    let cluster_names = config.clusters.cluster_names();
    let registry = build_registry(
        config.storage.layout,
        &cluster_names,
        config.storage.data_dir.as_deref(),
    )?;

    let outbox = ProvisioningWorker::new(
        registry.clone(),
        gateway,
        clock.clone(),
        config.provisioner.call_timeout(),
    )
    .with_max_in_flight(config.provisioner.max_in_flight)
    .spawn(config.provisioner.queue_capacity);

    let ctx = ManagerContext {
        registry,
        clusters: Arc::new(ClusterResolver::new(
            config.clusters.default_cluster.clone(),
            cluster_names.clone(),
        )),
        outbox: outbox.clone(),
        clock,
        policy: config.sessions.policy(),
        pods: PodDefaults {
            namespace: config.provisioner.pod_namespace.clone(),
            port: config.provisioner.pod_port,
        },
        advisory_lock: config.sessions.advisory_lock,
    };

    let state = AppState {
        perfetto: Arc::new(SessionManager::new(ViewerType::Perfetto, ctx.clone())),
        tracelens: Arc::new(SessionManager::new(ViewerType::Tracelens, ctx)),
        outbox,
        layout: config.storage.layout,
        clusters: cluster_names,
        started_at: Instant::now(),
    };

    let tools = Arc::new(ToolRegistry::new());
    register_session_tools(&tools, &[state.perfetto.clone(), state.tracelens.clone()])?;
    let mcp_server = MCPServer::new(tools);

    let mut router = Router::new().route("/health", get(health_check));
    for viewer in ViewerType::ALL {
        router = router.nest(
            &format!("/api/v1/{}", viewer.as_str()),
            sessions_router(state.manager(viewer).clone()),
        );
    }

    let cors = if config.server.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let router = router
        .with_state(state.clone())
        .merge(mcp_server.router())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(App { router, state })
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tracesession_server=info,tower_http=info".into());
    let subscriber = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    tracing::info!("Starting Tracesession Server");
    tracing::debug!("Configuration: {:#?}", config);

    config.validate()?;

    let app = build_app(&config, Arc::new(LoggingGateway), Arc::new(SystemClock))?;
    tracing::info!(
        layout = ?config.storage.layout,
        clusters = ?app.state.clusters,
        default_cluster = %config.clusters.default_cluster,
        "Session managers ready"
    );

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(stats = ?app.state.outbox.stats(), "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
