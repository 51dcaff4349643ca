//! One websocket connection: decode inbound frames into hub events and
//! forward the connection's outbox to the socket.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use voxhub_protocol::{ClientMessage, LeaveReason, PeerId};

use crate::hub::{Hub, Outbound};

pub async fn run_session(socket: WebSocket, hub: Hub, peer_id: Option<PeerId>) {
    let (connection_id, mut outbox) = match hub.connect(peer_id, serde_json::Map::new()).await {
        Ok(registered) => registered,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected websocket connection");
            return;
        }
    };
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut forward = tokio::spawn(async move {
        while let Some(out) = outbox.recv().await {
            match out {
                Outbound::Frame(text) => {
                    if ws_tx.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close(reason) => {
                    let frame = CloseFrame {
                        code: close_code::AWAY,
                        reason: close_reason(reason).into(),
                    };
                    let _ = ws_tx.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => match ClientMessage::decode(&text) {
                    Ok(message) => hub.message(&connection_id, message).await,
                    Err(e) => hub.reject_frame(&connection_id, e.to_string()).await,
                },
                Some(Ok(Message::Binary(_))) => {
                    hub.reject_frame(&connection_id, "binary frames are not supported".into()).await
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "Websocket read failed"
                    );
                    break;
                }
            },
            _ = &mut forward => break,
        }
    }

    hub.disconnect(&connection_id).await;
    forward.abort();
}

fn close_reason(reason: LeaveReason) -> &'static str {
    match reason {
        LeaveReason::IdleTimeout => "idle timeout",
        LeaveReason::Closed => "closed",
    }
}
