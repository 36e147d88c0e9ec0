//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::live_view::LiveView;
use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let view = Arc::clone(&state.live_view);
    ws.on_upgrade(move |socket| handle_socket(socket, view))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            None
        }
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, view: Arc<LiveView>) {
    let hub = Arc::clone(view.hub());
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = match hub.register(tx).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register WebSocket connection");
            let refusal = ServerMessage::Error {
                message: e.to_string(),
            };
            if let Some(msg) = encode(&refusal) {
                let _ = sender.send(msg).await;
            }
            return;
        }
    };

    // Queued through the hub so it precedes anything published afterwards
    let _ = hub
        .send_to(
            &connection_id,
            ServerMessage::Connected {
                connection_id: connection_id.clone(),
            },
        )
        .await;

    let conn_id_for_send = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Some(msg) = encode(&message) else {
                continue;
            };
            if sender.send(msg).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let view_for_recv = Arc::clone(&view);
    let conn_id_for_recv = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&view_for_recv, &conn_id_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.unregister(&connection_id).await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(view: &LiveView, connection_id: &str, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(view, connection_id, client_msg).await,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "Invalid client message"
                    );
                    let error_msg = ServerMessage::Error {
                        message: format!("Invalid message format: {}", e),
                    };
                    let _ = view.hub().send_to(connection_id, error_msg).await;
                }
            }
            true
        }
        Message::Binary(_) => {
            let error_msg = ServerMessage::Error {
                message: "Binary messages not supported".to_string(),
            };
            let _ = view.hub().send_to(connection_id, error_msg).await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message
async fn handle_client_message(view: &LiveView, connection_id: &str, message: ClientMessage) {
    let hub = view.hub();

    let reply = match message {
        ClientMessage::Subscribe { topics } => match hub.subscribe(connection_id, topics).await {
            Ok(subscribed) => {
                let replay = view.replay(&subscribed).await;
                let _ = hub
                    .send_to(connection_id, ServerMessage::Subscribed { topics: subscribed })
                    .await;
                for render in replay {
                    let _ = hub.send_to(connection_id, render).await;
                }
                return;
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "Subscribe error");
                ServerMessage::Error {
                    message: e.to_string(),
                }
            }
        },
        ClientMessage::Unsubscribe { topics } => {
            match hub.unsubscribe(connection_id, topics).await {
                Ok(unsubscribed) => ServerMessage::Unsubscribed {
                    topics: unsubscribed,
                },
                Err(e) => {
                    tracing::error!(connection_id = %connection_id, error = %e, "Unsubscribe error");
                    ServerMessage::Error {
                        message: e.to_string(),
                    }
                }
            }
        }
        ClientMessage::Ping => ServerMessage::Pong,
        ClientMessage::Input { element, value } => {
            if view.set_input(&element, value).await {
                return;
            }
            ServerMessage::Error {
                message: format!("Unknown input: {}", element),
            }
        }
    };

    let _ = hub.send_to(connection_id, reply).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{View, ViewContent};
    use crate::websocket::{ConnectionHub, HubConfig};

    fn live_view() -> LiveView {
        LiveView::new(
            Arc::new(ConnectionHub::new(HubConfig::default())),
            vec!["main-balance".to_string()],
            vec!["hija-nombre".to_string()],
        )
    }

    #[tokio::test]
    async fn test_subscribe_replays_current_content() {
        let view = live_view();
        view.render("main-balance", ViewContent::Text("150 FC".to_string()))
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = view.hub().register(tx).await.unwrap();

        handle_client_message(
            &view,
            &id,
            ClientMessage::Subscribe {
                topics: vec!["view.*".to_string()],
            },
        )
        .await;

        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Subscribed { .. })));
        match rx.try_recv() {
            Ok(ServerMessage::Render { element, content, .. }) => {
                assert_eq!(element, "main-balance");
                assert_eq!(content, "150 FC");
            }
            other => panic!("Expected Render, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_input_and_ping() {
        let view = live_view();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = view.hub().register(tx).await.unwrap();

        handle_client_message(
            &view,
            &id,
            ClientMessage::Input {
                element: "hija-nombre".to_string(),
                value: "Ana".to_string(),
            },
        )
        .await;
        assert_eq!(view.input_value("hija-nombre").await.as_deref(), Some("Ana"));
        assert!(rx.try_recv().is_err());

        handle_client_message(
            &view,
            &id,
            ClientMessage::Input {
                element: "nope".to_string(),
                value: "x".to_string(),
            },
        )
        .await;
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Error { .. })));

        handle_client_message(&view, &id, ClientMessage::Ping).await;
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Pong)));
    }

    #[tokio::test]
    async fn test_close_message_ends_connection() {
        let view = live_view();
        assert!(!handle_ws_message(&view, "unknown", Message::Close(None)).await);
        assert!(handle_ws_message(&view, "unknown", Message::Text("{}".to_string())).await);
    }
}
