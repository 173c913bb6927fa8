//! # Subscriber channel over websocket (§6)
//!
//! Bridges an axum websocket connection to a transport-agnostic
//! [`fleetlink_hub::SubscriberChannel`]: one task reads decoded [`Inbound`] frames and drives
//! [`fleetlink_hub::commands`]; a second drains the channel's outbound queue and writes JSON
//! text frames back. Either task ending closes the other via the channel's cancellation.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use fleetlink_hub::{commands, HubError, Inbound, Outbound, SubscriberChannel};

use crate::app::SharedState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let channel = state.hub.register();
    let (mut sink, mut stream) = socket.split();

    channel
        .enqueue(Outbound::Status { requires_auth: true })
        .await;

    let dispatcher_channel = channel.clone();
    let dispatcher = tokio::spawn(async move {
        while let Some(frame) = dispatcher_channel.next_outbound().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            if matches!(message, Message::Close(_)) {
                break;
            }
            continue;
        };
        let inbound: Inbound = match serde_json::from_str(&text) {
            Ok(inbound) => inbound,
            Err(err) => {
                channel
                    .enqueue(Outbound::Error { message: format!("malformed message: {err}") })
                    .await;
                continue;
            }
        };
        handle_inbound(&state, &channel, inbound).await;
    }

    channel.close();
    let _ = dispatcher.await;
    state.hub.unregister(channel.id());
}

async fn handle_inbound(state: &SharedState, channel: &SubscriberChannel, inbound: Inbound) {
    if let Inbound::Ping = inbound {
        return;
    }

    if !channel.is_authenticated() {
        match inbound {
            Inbound::Auth { bearer, .. } => authenticate(state, channel, &bearer).await,
            _ => {
                channel.enqueue(Outbound::Error { message: HubError::NotAuthenticated.wire_message() }).await;
            }
        }
        return;
    }

    let principal_id = channel.principal_id().await.expect("authenticated channel has a principal");

    match inbound {
        Inbound::Auth { bearer, .. } => authenticate(state, channel, &bearer).await,
        Inbound::Connect { connection_string } => {
            let endpoint = match commands::parse_connection_string(&connection_string) {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    channel.enqueue(Outbound::Error { message: err.wire_message() }).await;
                    return;
                }
            };
            match state.manager.resolve_owned_for_connect(principal_id, Some(&endpoint)) {
                Some(drone_id) => {
                    if let Err(err) = commands::connect(&state.manager, drone_id).await {
                        channel.enqueue(Outbound::Error { message: err.wire_message() }).await;
                    }
                }
                None => {
                    channel
                        .enqueue(Outbound::Error {
                            message: HubError::NoMatchingDrone(connection_string).wire_message(),
                        })
                        .await
                }
            }
        }
        Inbound::Disconnect => dispatch(channel, commands::resolve_target(&state.manager, principal_id, None).and_then(|id| commands::disconnect(&state.manager, id))).await,
        Inbound::Arm => dispatch(channel, commands::resolve_target(&state.manager, principal_id, None).and_then(|id| commands::arm(&state.manager, id))).await,
        Inbound::Disarm => dispatch(channel, commands::resolve_target(&state.manager, principal_id, None).and_then(|id| commands::disarm(&state.manager, id))).await,
        Inbound::SetMode { mode } => dispatch(channel, commands::resolve_target(&state.manager, principal_id, None).and_then(|id| commands::set_mode(&state.manager, id, &mode))).await,
        Inbound::Ping => {}
    }
}

async fn authenticate(state: &SharedState, channel: &SubscriberChannel, bearer: &str) {
    match state.auth.verify(bearer).await {
        Ok(principal) => {
            channel.authenticate(principal.user_id, principal.is_admin).await;
            channel.enqueue(Outbound::Status { requires_auth: false }).await;
        }
        Err(_) => {
            channel
                .enqueue(Outbound::Error { message: HubError::NotAuthenticated.wire_message() })
                .await;
        }
    }
}

async fn dispatch(channel: &SubscriberChannel, result: Result<(), HubError>) {
    if let Err(err) = result {
        channel.enqueue(Outbound::Error { message: err.wire_message() }).await;
    }
}
