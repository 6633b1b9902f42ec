//! CDP command/response correlation on top of a [`Transport`].
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Connection::send_command`] with a method and params
//! 2. Connection allocates a request ID and parks a oneshot sender under it
//! 3. Request is serialized and written through the transport
//! 4. [`Connection::run`] reads inbound messages and completes the matching oneshot
//! 5. Events (messages without `id`) are fanned out to [`Connection::subscribe`] receivers
//!
//! When the transport closes, every pending request fails with
//! [`Error::ChannelClosed`] and event receivers see the channel closed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use pagecast_protocol::{ErrorPayload, Event, Message, Request};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver};

type Callbacks = Arc<Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// Connection to a single CDP target.
///
/// Shareable across tasks behind an `Arc`; concurrent commands are supported.
pub struct Connection {
	last_id: AtomicU32,
	callbacks: Callbacks,
	sender: Mutex<Box<dyn Transport>>,
	inbound: parking_lot::Mutex<Option<(Box<dyn TransportReceiver>, mpsc::UnboundedReceiver<Value>)>>,
	events: parking_lot::Mutex<Option<broadcast::Sender<Event>>>,
}

impl Connection {
	pub fn new(parts: TransportParts) -> Self {
		let (events, _) = broadcast::channel(64);
		Self {
			last_id: AtomicU32::new(0),
			callbacks: Arc::new(Mutex::new(HashMap::new())),
			sender: Mutex::new(parts.sender),
			inbound: parking_lot::Mutex::new(Some((parts.receiver, parts.message_rx))),
			events: parking_lot::Mutex::new(Some(events)),
		}
	}

	/// Subscribes to target events received after this call.
	///
	/// Once the transport has closed the receiver reports the channel closed.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		match self.events.lock().as_ref() {
			Some(events) => events.subscribe(),
			None => broadcast::channel(1).1,
		}
	}

	/// Sends a command and awaits its raw JSON result.
	pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().await.insert(id, tx);

		let request = Request {
			id,
			method: method.to_string(),
			params,
			session_id: None,
		};

		let request_value = serde_json::to_value(&request)?;
		if let Err(err) = self.sender.lock().await.send(request_value).await {
			self.callbacks.lock().await.remove(&id);
			return Err(err);
		}

		rx.await.map_err(|_| Error::ChannelClosed).and_then(|result| result)
	}

	/// Sends a typed command and decodes its result.
	pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R>
	where
		P: Serialize + ?Sized,
		R: DeserializeOwned,
	{
		let value = self.send_command(method, serde_json::to_value(params)?).await?;
		Ok(serde_json::from_value(value)?)
	}

	/// Runs the dispatch loop until the transport closes.
	///
	/// Only the first call does any work; later calls return immediately.
	pub async fn run(&self) {
		let Some((receiver, mut message_rx)) = self.inbound.lock().take() else {
			warn!(target = "pagecast.cdp", "connection dispatch loop already running");
			return;
		};

		let transport_handle = tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				debug!(target = "pagecast.cdp", error = %e, "transport receive loop failed");
			}
		});

		while let Some(message_value) = message_rx.recv().await {
			match serde_json::from_value::<Message>(message_value.clone()) {
				Ok(message) => {
					if let Err(e) = self.dispatch(message).await {
						debug!(target = "pagecast.cdp", error = %e, "dropping message");
					}
				}
				Err(e) => {
					error!(target = "pagecast.cdp", error = %e, message = %message_value, "failed to parse message");
				}
			}
		}

		debug!(target = "pagecast.cdp", "message loop ended (transport closed)");
		// Dropping the senders fails every pending request with ChannelClosed.
		self.callbacks.lock().await.clear();
		self.events.lock().take();
		let _ = transport_handle.await;
	}

	async fn dispatch(&self, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let callback = self
					.callbacks
					.lock()
					.await
					.remove(&response.id)
					.ok_or_else(|| Error::Context(format!("Cannot find request to respond: id={}", response.id)))?;

				let result = match response.error {
					Some(payload) => Err(protocol_error(payload)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};

				// The caller may have given up waiting.
				let _ = callback.send(result);
				Ok(())
			}
			Message::Event(event) => {
				debug!(target = "pagecast.cdp", method = %event.method, "event");
				if let Some(events) = self.events.lock().as_ref() {
					let _ = events.send(event);
				}
				Ok(())
			}
		}
	}
}

fn protocol_error(payload: ErrorPayload) -> Error {
	let message = match payload.data {
		Some(data) if !data.is_empty() => format!("{} ({})", payload.message, data),
		_ => payload.message,
	};
	Error::Protocol { code: payload.code, message }
}
