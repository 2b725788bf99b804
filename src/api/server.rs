// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use axum::routing::post;
use tokio::net::TcpListener;

use crate::api::handlers;
use crate::api::state::ServerState;
use crate::error::Fallible;
use crate::manager::ServerManager;

pub fn router(manager: Arc<ServerManager>) -> Router {
    let state = ServerState { manager };
    let app = Router::new();
    let app = app.route("/api/installation", get(handlers::installation));
    let app = app.route("/api/status", get(handlers::status));
    let app = app.route("/api/start", post(handlers::start));
    let app = app.route("/api/stop", post(handlers::stop));
    let app = app.route("/api/restart", post(handlers::restart));
    let app = app.route(
        "/api/config/{kind}",
        get(handlers::get_config).put(handlers::put_config),
    );
    let app = app.route("/api/session", get(handlers::session));
    let app = app.route("/api/results", get(handlers::results));
    let app = app.route("/api/leaderboard", get(handlers::leaderboard));
    let app = app.route("/api/drivers/{id}", get(handlers::driver));
    let app = app.route("/api/logs", get(handlers::logs));
    let app = app.route("/api/refresh", post(handlers::refresh));
    let app = app.fallback(handlers::not_found);
    app.with_state(state)
}

/// Serve the API until interrupted.
pub async fn start_server(manager: Arc<ServerManager>, bind: &str) -> Fallible<()> {
    let report = manager.validate_installation();
    match &report.reason {
        None => log::info!("Installation at {}", report.root.as_deref().unwrap_or("")),
        Some(reason) => log::warn!("Installation is not usable: {reason}"),
    }
    let app = router(manager);
    log::info!("Starting server on {bind}");
    let listener = TcpListener::bind(bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Cannot listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down.");
}
