//! Shared WebSocket type aliases and the single "serialize and queue a
//! frame" helper every outbound path (commands, heartbeats) funnels through.
//!
//! Grounded on `twilight-gateway`'s old `shard/socket_forwarder.rs`: rather
//! than share a `Mutex`-guarded sink between every writer, each writer holds
//! a clone of an unbounded channel sender, and the single receive loop is
//! the only task that ever touches the real sink, draining the channel
//! alongside incoming frames.

use crate::error::{Error, ErrorType};
use serde::Serialize;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A cheaply-cloned handle writers (commands, the heartbeat task) use to
/// queue a frame for the receive loop to actually send.
pub type CommandSender = mpsc::UnboundedSender<Message>;
pub type CommandReceiver = mpsc::UnboundedReceiver<Message>;

pub fn channel() -> (CommandSender, CommandReceiver) {
    mpsc::unbounded_channel()
}

/// Serializes `payload` to JSON and queues it as a text frame.
pub fn send_payload(sender: &CommandSender, payload: &impl Serialize) -> Result<(), Error> {
    let text = serde_json::to_string(payload).map_err(|source| Error::new(ErrorType::Serializing, Some(Box::new(source))))?;

    sender
        .send(Message::Text(text))
        .map_err(|source| Error::new(ErrorType::Sending, Some(Box::new(source))))
}
