//! Request handlers for different server endpoints

pub mod recommendation;
pub mod websocket;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use warp::Filter;

use crate::constants::{HEALTH_PATH, RECOMMEND_PATH, WS_PATH};
use crate::core::relay::SharedRelay;

// Re-export the handlers
pub use recommendation::handle_recommendation;
pub use websocket::handle_connection;

const MAX_RECOMMENDATION_BODY_BYTES: u64 = 16 * 1024;

// Helper function to include the relay in request
fn with_relay(relay: SharedRelay) -> impl Filter<Extract = (SharedRelay,), Error = Infallible> + Clone {
    warp::any().map(move || relay.clone())
}

async fn serve_index(index: Option<PathBuf>) -> Result<warp::reply::Html<String>, warp::Rejection> {
    let path = index.ok_or_else(warp::reject::not_found)?;
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => Ok(warp::reply::html(body)),
        Err(e) => {
            log::error!("Failed to read static index '{}': {}", path.display(), e);
            Err(warp::reject::not_found())
        }
    }
}

/// All relay routes: `/ws`, `/health`, `/recommend` and the optional index page
pub fn routes(
    relay: SharedRelay,
    static_index: Option<PathBuf>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let ws_route = warp::path(WS_PATH)
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::addr::remote())
        .and(with_relay(relay.clone()))
        .map(|ws: warp::ws::Ws, addr: Option<SocketAddr>, relay: SharedRelay| {
            log::debug!("New websocket connection from {:?}", addr);
            let max_frame = relay.max_frame_bytes();
            ws.max_message_size(max_frame)
                .max_frame_size(max_frame)
                .on_upgrade(move |socket| handle_connection(socket, addr, relay))
        });

    let health_route = warp::path(HEALTH_PATH).and(warp::path::end()).map(|| "OK");

    let recommend_route = warp::post()
        .and(warp::path(RECOMMEND_PATH))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_RECOMMENDATION_BODY_BYTES))
        .and(warp::body::json())
        .and(with_relay(relay))
        .and_then(handle_recommendation);

    let index_route = warp::get()
        .and(warp::path::end())
        .and(warp::any().map(move || static_index.clone()))
        .and_then(serve_index);

    ws_route
        .or(health_route)
        .or(recommend_route)
        .or(index_route)
        .with(warp::log("shout_relay::http"))
}
