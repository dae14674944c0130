// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

mod args;
mod dispatch;

use crate::args::{CmdArgs, Parser};
use mgmt::rest_api;
use routing::RouterRegistry;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(EnvFilter::new(filter))
        .init();
}

#[tokio::main]
async fn main() {
    let args = CmdArgs::parse();
    init_logging(args.log_filter());
    info!("Starting router controller...");

    let registry = Arc::new(RouterRegistry::new());

    // The switch-session layer (wire codec) drives the controller through
    // this sender; keep it alive for the process lifetime.
    let (_session_tx, dispatcher) = dispatch::start(registry.clone(), args.switchboard());

    let rest_address = args.rest_address();
    let app = rest_api(registry.clone());
    let rest = tokio::spawn(async move {
        if let Err(e) = axum_server::bind(rest_address)
            .serve(app.into_make_service())
            .await
        {
            error!("REST server error: {e}");
        }
    });
    info!("REST API listening on {rest_address}");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for SIGINT: {e}");
    }
    info!("Shutting down router controller");
    registry.unregister_all().await;
    rest.abort();
    dispatcher.abort();
}
