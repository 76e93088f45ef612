//! Websocket subscribers. Each connection forwards every published sample
//! as an `["emg_data", <scalar>]` text frame until the client leaves.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};

use crate::broadcaster::encode_event;

use super::state::AppContext;

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<AppContext>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, ctx))
}

#[tracing::instrument(skip_all)]
async fn handle_socket(socket: WebSocket, ctx: AppContext) {
    let (mut sender, mut receiver) = socket.split();
    let mut samples = BroadcastStream::new(ctx.broadcaster.subscribe());

    info!(
        subscribers = ctx.broadcaster.subscriber_count(),
        "Client connected."
    );

    let send_task = async {
        while let Some(item) = samples.next().await {
            let sample = match item {
                Ok(sample) => sample,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    debug!("Client fell behind, skipped {} samples.", skipped);
                    continue;
                }
            };
            let frame = match encode_event(sample) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Failed to encode sample {}. Error: {}", sample, e);
                    continue;
                }
            };
            if sender.send(Message::Text(frame.into())).await.is_err() {
                debug!("Send failed, client went away.");
                break;
            }
        }
    };

    // Inbound frames carry nothing; only watch for the client leaving.
    let recv_task = async {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                debug!("Client sent close frame.");
                break;
            }
        }
    };

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
        _ = ctx.token.cancelled() => {
            debug!("Shutting down, dropping client.");
        },
    }

    drop(samples);
    info!(
        subscribers = ctx.broadcaster.subscriber_count(),
        "Client disconnected."
    );
}
