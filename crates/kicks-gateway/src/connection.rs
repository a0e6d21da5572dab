use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kicks_types::api::Claims;
use kicks_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long an unauthenticated socket may wait before sending Identify.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Decode and validate a JWT issued by the REST API.
pub fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// Handle a single WebSocket connection.
///
/// `user_id` is set when the token was already validated at the HTTP upgrade;
/// otherwise the client must send `Identify` first.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    jwt_secret: String,
    user_id: Option<Uuid>,
) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match user_id {
        Some(id) => id,
        None => match wait_for_identify(&mut receiver, &jwt_secret).await {
            Some(id) => id,
            None => {
                warn!("WebSocket client failed to identify, closing");
                return;
            }
        },
    };

    info!("{} connected to gateway", user_id);

    let Some(ready) = encode(&GatewayEvent::Ready { user_id }) else {
        return;
    };
    if sender.send(ready).await.is_err() {
        return;
    }

    run_connection_loop(sender, receiver, dispatcher, user_id).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    user_id: Uuid,
) {
    let (conn_id, mut user_rx) = dispatcher.register_connection(user_id).await;
    let mut feed_rx = dispatcher.subscribe_feed();
    debug!(
        "{} has {} open gateway connection(s)",
        user_id,
        dispatcher.connection_count(user_id).await
    );

    // Feed events are only forwarded while the client has the feed open.
    let feed_subscribed = Arc::new(AtomicBool::new(false));
    let feed_flag_send = feed_subscribed.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = feed_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Feed receiver lagged by {} events", n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if !feed_flag_send.load(Ordering::Acquire) {
                        continue;
                    }
                    let Some(msg) = encode(&event) else { continue };
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let Some(event) = result else { break };
                    let Some(msg) = encode(&event) else { continue };
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(text.as_str()) {
                    Ok(cmd) => handle_command(user_id, cmd, &feed_subscribed),
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_connection(user_id, conn_id).await;
    info!("{} disconnected from gateway", user_id);
}

fn handle_command(user_id: Uuid, cmd: GatewayCommand, feed_subscribed: &AtomicBool) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled
        GatewayCommand::SubscribeFeed => {
            info!("{} subscribed to feed", user_id);
            feed_subscribed.store(true, Ordering::Release);
        }
        GatewayCommand::UnsubscribeFeed => {
            info!("{} unsubscribed from feed", user_id);
            feed_subscribed.store(false, Ordering::Release);
        }
    }
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, jwt_secret: &str) -> Option<Uuid> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(text.as_str())
                {
                    return verify_token(&token, jwt_secret).map(|claims| claims.sub);
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

fn encode(event: &GatewayEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            None
        }
    }
}
