//! Command, response and event envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command sent to a CDP target.
///
/// ```json
/// { "id": 7, "method": "Page.navigate", "params": { "url": "https://example.com" } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	/// Unique request ID for correlating responses.
	pub id: u32,
	/// Fully qualified method name (`Domain.method`).
	pub method: String,
	/// Method parameters as a JSON object.
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
	/// Flattened target session, only used on browser-level connections.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Response to a [`Request`], either `result` or `error` is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	pub id: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

/// Protocol error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// JSON-RPC error code (`-32000` for most CDP failures).
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Unsolicited notification from the target (no `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Discriminated union of inbound messages.
///
/// Uses serde's `untagged` to distinguish based on presence of the `id` field:
/// messages with `id` are responses, messages without are events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	Response(Response),
	Event(Event),
}
