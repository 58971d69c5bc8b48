mod api;
mod config;
mod error;
mod jobs;
mod signaling;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use warp::Filter;

use config::Config;
use jobs::{HttpJobStore, InMemoryJobStore, JobStore};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let jobs: Arc<dyn JobStore> = match &config.jobs.service_url {
        Some(url) => {
            tracing::info!(url = %url, "Using external job service for password checks");
            Arc::new(HttpJobStore::new(url.clone()))
        }
        None => {
            tracing::warn!("JOB_SERVICE_URL not set, password checks use an empty in-memory store");
            Arc::new(InMemoryJobStore::new())
        }
    };

    let routes = api::routes::signal_websocket_route(jobs)
        .or(api::routes::signal_health_check())
        .or(api::routes::signal_config_endpoint());

    let addr = config.bind_address();
    tracing::info!(port = addr.1, "Starting interview signal server");
    warp::serve(routes).run(addr).await;
}
