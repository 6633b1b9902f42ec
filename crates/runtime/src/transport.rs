//! Message transports carrying CDP JSON over a duplex channel.
//!
//! A transport is split into a sending half ([`Transport`]) and a receive loop
//! ([`TransportReceiver`]) that forwards every inbound JSON message into an
//! unbounded channel consumed by [`Connection`](crate::Connection).

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::Result;

/// Sending half of a transport.
pub trait Transport: Send {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Receive loop of a transport. Runs until the peer closes or an error occurs.
pub trait TransportReceiver: Send {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Everything a [`Connection`](crate::Connection) needs from a transport.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport to a CDP target (`ws://127.0.0.1:<port>/devtools/page/<id>`).
pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Opens the WebSocket and splits it into transport parts.
	pub async fn connect(url: &str) -> Result<TransportParts> {
		let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
		debug!(target = "pagecast.cdp", %url, "websocket connected");

		let (sink, stream) = stream.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		Ok(TransportParts {
			sender: Box::new(WebSocketSender { sink }),
			receiver: Box::new(WebSocketReceiver { stream, message_tx }),
			message_rx,
		})
	}
}

struct WebSocketSender {
	sink: SplitSink<WsStream, Message>,
}

impl Transport for WebSocketSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(send_json(&mut self.sink, message))
	}
}

async fn send_json(sink: &mut SplitSink<WsStream, Message>, message: Value) -> Result<()> {
	let text = serde_json::to_string(&message)?;
	sink.send(Message::Text(text)).await?;
	Ok(())
}

struct WebSocketReceiver {
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for WebSocketReceiver {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		let WebSocketReceiver { stream, message_tx } = *self;
		Box::pin(forward_frames(stream, message_tx))
	}
}

async fn forward_frames(mut stream: SplitStream<WsStream>, message_tx: mpsc::UnboundedSender<Value>) -> Result<()> {
	while let Some(frame) = stream.next().await {
		let value: Value = match frame? {
			Message::Text(text) => serde_json::from_str(&text)?,
			Message::Binary(bytes) => serde_json::from_slice(&bytes)?,
			Message::Close(_) => break,
			_ => continue,
		};
		if message_tx.send(value).is_err() {
			break;
		}
	}
	debug!(target = "pagecast.cdp", "websocket receive loop ended");
	Ok(())
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use tokio::net::TcpListener;

	use super::*;

	#[tokio::test]
	async fn websocket_transport_echo_round_trip() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		let server = tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
			let (mut ws_tx, mut ws_rx) = ws.split();

			let incoming = ws_rx.next().await.unwrap().unwrap();
			assert_eq!(incoming, Message::Text("{\"id\":1,\"method\":\"Page.enable\"}".into()));

			ws_tx.send(Message::Text("{\"id\":1,\"result\":{}}".into())).await.unwrap();
		});

		let parts = WebSocketTransport::connect(&format!("ws://{}", addr)).await.unwrap();
		let mut sender = parts.sender;
		let mut rx = parts.message_rx;
		let recv_task = tokio::spawn(parts.receiver.run());

		sender.send(json!({ "id": 1, "method": "Page.enable" })).await.unwrap();

		let reply = rx.recv().await.expect("should receive reply");
		assert_eq!(reply["id"], 1);

		// The receive loop may end with a close error once the server task finishes.
		recv_task.abort();
		let _ = recv_task.await;
		server.await.unwrap();
	}
}
