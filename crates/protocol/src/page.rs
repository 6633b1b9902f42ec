//! `Page` domain.

use serde::{Deserialize, Serialize};

pub const PAGE_ENABLE: &str = "Page.enable";
pub const PAGE_NAVIGATE: &str = "Page.navigate";
/// Event sent once the main frame's `load` event has fired.
pub const PAGE_LOAD_EVENT_FIRED: &str = "Page.loadEventFired";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateParams {
	pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResult {
	pub frame_id: String,
	#[serde(default)]
	pub loader_id: Option<String>,
	/// Set when the navigation failed before a document was committed.
	#[serde(default)]
	pub error_text: Option<String>,
}

impl NavigateResult {
	/// Returns the navigation failure text, treating an empty string as success.
	pub fn failure(&self) -> Option<&str> {
		self.error_text.as_deref().filter(|text| !text.is_empty())
	}
}
