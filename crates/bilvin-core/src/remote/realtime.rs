//! Realtime change feed over the hosted store's websocket.
//!
//! Joins the `wishlist_changes` channel asking for every postgres change on
//! `public.wishlist_items`, keeps the socket alive with heartbeats, and
//! turns `postgres_changes` frames into [`ChangeEvent`]s.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{ChangeEvent, Subscription, CHANNEL, TABLE};
use crate::config::RemoteConfig;
use crate::error::{WishlistError, WishlistResult};
use crate::types::{ItemId, WishlistItem};

/// Interval between keep-alive heartbeats
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct KeyOnly {
    id: ItemId,
}

fn topic() -> String {
    format!("realtime:{}", CHANNEL)
}

/// `phx_join` frame subscribing to all changes of the wishlist table
pub fn join_message(access_token: &str) -> Value {
    json!({
        "topic": topic(),
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": TABLE }
                ]
            },
            "access_token": access_token
        },
        "ref": "1",
        "join_ref": "1"
    })
}

pub fn heartbeat_message(seq: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": seq.to_string()
    })
}

/// Decode one text frame.
///
/// Returns `Ok(None)` for frames that aren't row changes for our table
/// (replies, presence, system messages).
pub fn parse_frame(text: &str) -> WishlistResult<Option<ChangeEvent>> {
    let frame: Frame = serde_json::from_str(text)?;

    if frame.event == "phx_reply" {
        if frame.payload.get("status").and_then(Value::as_str) == Some("error") {
            warn!(topic = %frame.topic, payload = %frame.payload, "Realtime join rejected");
        }
        return Ok(None);
    }
    if frame.event != "postgres_changes" || frame.topic != topic() {
        return Ok(None);
    }

    let ChangePayload { data } = serde_json::from_value(frame.payload)?;
    if data.table.as_deref().is_some_and(|t| t != TABLE) {
        return Ok(None);
    }

    let missing = |field: &str| {
        WishlistError::Serialization(format!("{} event without {}", data.kind, field))
    };
    let event = match data.kind.as_str() {
        "INSERT" => {
            let row: WishlistItem =
                serde_json::from_value(data.record.clone().ok_or_else(|| missing("record"))?)?;
            ChangeEvent::Inserted(row)
        }
        "UPDATE" => {
            let row: WishlistItem =
                serde_json::from_value(data.record.clone().ok_or_else(|| missing("record"))?)?;
            ChangeEvent::Updated(row)
        }
        "DELETE" => {
            let old: KeyOnly = serde_json::from_value(
                data.old_record.clone().ok_or_else(|| missing("old_record"))?,
            )?;
            ChangeEvent::Deleted { id: old.id }
        }
        other => {
            debug!(kind = other, "Ignoring realtime change kind");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

/// Open the socket, join the channel and start pumping events.
pub async fn connect(config: &RemoteConfig) -> WishlistResult<Subscription> {
    let (socket, _) = tokio_tungstenite::connect_async(config.realtime_url())
        .await
        .map_err(|e| WishlistError::BackendUnavailable(format!("realtime connect: {}", e)))?;
    let (mut sink, mut stream) = socket.split();

    sink.send(Message::Text(join_message(&config.anon_key).to_string()))
        .await
        .map_err(|e| WishlistError::BackendUnavailable(format!("realtime join: {}", e)))?;
    info!(channel = CHANNEL, "Subscribed to wishlist changes");

    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        // First tick fires immediately; the join just went out.
        heartbeat.tick().await;
        let mut seq: u64 = 1;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    seq += 1;
                    if let Err(e) = sink.send(Message::Text(heartbeat_message(seq).to_string())).await {
                        warn!(error = %e, "Realtime heartbeat failed");
                        break;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                        Ok(Some(event)) => {
                            debug!(id = %event.item_id(), "Realtime change received");
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "Unreadable realtime frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Realtime socket error");
                        break;
                    }
                }
            }
        }
        info!("Realtime connection closed");
    });

    Ok(Subscription::new(rx, task))
}
