//! Payloads served by the remote-debugging HTTP endpoint.

use serde::{Deserialize, Serialize};

/// `/json/version` response subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser", default)]
	pub browser: Option<String>,
	#[serde(rename = "Protocol-Version", default)]
	pub protocol_version: Option<String>,
}

/// One entry of the `/json/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	pub id: String,
	#[serde(rename = "type")]
	pub target_type: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	/// Absent when another client is already attached to the target.
	#[serde(default)]
	pub web_socket_debugger_url: Option<String>,
}

impl TargetInfo {
	/// Returns `true` for top-level page targets.
	pub fn is_page(&self) -> bool {
		self.target_type == "page"
	}
}
