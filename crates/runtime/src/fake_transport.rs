//! In-memory transport for exercising [`Connection`](crate::Connection) and
//! everything built on it without a browser.
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! let connection = Arc::new(Connection::new(parts));
//! tokio::spawn({
//!     let conn = Arc::clone(&connection);
//!     async move { conn.run().await }
//! });
//!
//! let pending = tokio::spawn(async move { connection.send_command("Page.enable", json!({})).await });
//! controller.wait_for_sent(1).await;
//! controller.inject_response(0, json!({}));
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};

use crate::error::Result;
use crate::transport::{Transport, TransportParts, TransportReceiver};

#[derive(Default)]
pub struct FakeTransportBuilder;

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self
	}

	/// Returns the transport parts for a [`Connection`](crate::Connection) and a
	/// controller that plays the browser side.
	pub fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let sent = Arc::new(Mutex::new(Vec::new()));

		let parts = TransportParts {
			sender: Box::new(FakeSender { sent: Arc::clone(&sent) }),
			receiver: Box::new(FakeReceiver { inbound_rx, message_tx }),
			message_rx,
		};

		(parts, FakeTransportController { inbound_tx, sent })
	}
}

/// Browser side of a fake transport.
///
/// Dropping the controller closes the transport.
pub struct FakeTransportController {
	inbound_tx: mpsc::UnboundedSender<Value>,
	sent: Arc<Mutex<Vec<Value>>>,
}

impl FakeTransportController {
	pub fn inject(&self, message: Value) {
		let _ = self.inbound_tx.send(message);
	}

	pub fn inject_response(&self, id: u32, result: Value) {
		self.inject(json!({ "id": id, "result": result }));
	}

	pub fn inject_error(&self, id: u32, code: i64, message: &str) {
		self.inject(json!({ "id": id, "error": { "code": code, "message": message } }));
	}

	pub fn inject_event(&self, method: &str, params: Value) {
		self.inject(json!({ "method": method, "params": params }));
	}

	/// Takes every message sent so far, clearing the buffer.
	pub async fn take_sent(&self) -> Vec<Value> {
		std::mem::take(&mut *self.sent.lock().await)
	}

	/// Waits until at least `count` messages are buffered and returns a copy.
	///
	/// Panics after two seconds; meant for tests only.
	pub async fn wait_for_sent(&self, count: usize) -> Vec<Value> {
		let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
		loop {
			{
				let sent = self.sent.lock().await;
				if sent.len() >= count {
					return sent.clone();
				}
			}
			assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {count} sent messages");
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	}
}

struct FakeSender {
	sent: Arc<Mutex<Vec<Value>>>,
}

impl Transport for FakeSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		let sent = Arc::clone(&self.sent);
		Box::pin(async move {
			sent.lock().await.push(message);
			Ok(())
		})
	}
}

struct FakeReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Value>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for FakeReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(message) = self.inbound_rx.recv().await {
				if self.message_tx.send(message).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}
