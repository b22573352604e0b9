use std::thread;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tungstenite::Message;

use crate::events::RawEvent;

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Subscribes to the host push channel.
///
/// Frames are JSON text messages of the form
/// `{"event": "download-progress", "payload": {...}}`. A dedicated reader
/// thread owns the socket and forwards frames in arrival order; the async
/// side consumes them from the returned receiver. The thread reconnects
/// with a fixed backoff and exits once the receiver is dropped.
pub fn spawn_event_listener(events_url: String) -> mpsc::UnboundedReceiver<RawEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || listen_loop(&events_url, tx));
    rx
}

fn listen_loop(url: &str, tx: mpsc::UnboundedSender<RawEvent>) {
    loop {
        match tungstenite::connect(url) {
            Ok((mut socket, _response)) => {
                log::info!("event channel connected: {url}");
                loop {
                    match socket.read() {
                        Ok(Message::Text(text)) => {
                            if let Some(raw) = parse_frame(&text) {
                                if tx.send(raw).is_err() {
                                    return; // receiver gone, shut down
                                }
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {} // ping/pong/binary: nothing to forward
                        Err(e) => {
                            log::warn!("event channel read failed: {e}");
                            break;
                        }
                    }
                }
                log::warn!("event channel closed, reconnecting");
            }
            Err(e) => log::warn!("event channel connect failed: {e}"),
        }
        if tx.is_closed() {
            return;
        }
        thread::sleep(RECONNECT_DELAY);
    }
}

fn parse_frame(text: &str) -> Option<RawEvent> {
    let value: Value = serde_json::from_str(text).ok()?;
    let name = value.get("event")?.as_str()?.to_string();
    let payload = value.get("payload").cloned().unwrap_or(Value::Null);
    Some(RawEvent { name, payload })
}
