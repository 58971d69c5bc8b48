use std::sync::Arc;

use warp::Filter;

use super::websocket;
use crate::jobs::JobStore;
use crate::signaling::SignalServer;

/// Creates the signaling WebSocket route backed by the given job store.
pub fn signal_websocket_route(
    jobs: Arc<dyn JobStore>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let server = SignalServer::new(jobs);

    warp::path("signal")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_signal_server(server))
        .map(|ws: warp::ws::Ws, server: Arc<SignalServer>| {
            ws.on_upgrade(move |websocket| {
                websocket::handle_signal_websocket(websocket, server)
            })
        })
}

pub fn signal_health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("signal")
        .and(warp::path("health"))
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "Interview Signal Server",
                "version": env!("CARGO_PKG_VERSION")
            }))
        })
}

/// Client-facing configuration for browser peers (websocket and STUN urls).
pub fn signal_config_endpoint() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("signal")
        .and(warp::path("config"))
        .and(warp::get())
        .map(|| {
            use std::env;

            let config = serde_json::json!({
                "SIGNAL_WEBSOCKET_URL": env::var("SIGNAL_WEBSOCKET_URL").ok(),
                "STUN_SERVER_URL": env::var("STUN_SERVER_URL").ok(),
            });

            warp::reply::json(&config)
        })
}

fn with_signal_server(
    server: Arc<SignalServer>,
) -> impl Filter<Extract = (Arc<SignalServer>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || server.clone())
}
