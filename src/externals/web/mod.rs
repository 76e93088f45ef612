//! HTTP side: the static live-chart page and the websocket endpoint.

pub mod state;
pub mod websocket;

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use state::AppContext;

const INDEX_HTML: &str = include_str!("../../../assets/index.html");

/// GET /
pub async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Task: Serve pages and websocket subscribers until the context's token
/// is cancelled.
#[tracing::instrument(skip_all)]
pub async fn task_serve(listener: TcpListener, ctx: AppContext) -> std::io::Result<()> {
    let token = ctx.token.clone();
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(ctx))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    info!("Stopped.");
    Ok(())
}
