//! Remote-debugging HTTP endpoint probing.

use std::time::Duration;

use pagecast_protocol::{TargetInfo, VersionInfo};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

fn http_client() -> Result<reqwest::Client> {
	reqwest::Client::builder()
		.timeout(Duration::from_millis(400))
		.build()
		.map_err(|e| Error::Context(format!("Failed to create HTTP client: {}", e)))
}

async fn get_json<T: DeserializeOwned>(port: u16, path: &str) -> Result<T> {
	let client = http_client()?;
	let mut last_error = "no response".to_string();

	for url in [format!("http://127.0.0.1:{}{}", port, path), format!("http://localhost:{}{}", port, path)] {
		let response = match client.get(&url).send().await {
			Ok(r) => r,
			Err(e) => {
				last_error = e.to_string();
				continue;
			}
		};

		if !response.status().is_success() {
			last_error = format!("unexpected status {}", response.status());
			continue;
		}

		return response
			.json()
			.await
			.map_err(|e| Error::Context(format!("Failed to parse {} response: {}", path, e)));
	}

	Err(Error::Context(format!("Failed to connect to port {}: {}", port, last_error)))
}

/// Resolves `/json/version` metadata on `port`.
pub async fn fetch_version(port: u16) -> Result<VersionInfo> {
	get_json(port, "/json/version").await
}

/// Lists debuggable targets on `port`.
pub async fn list_targets(port: u16) -> Result<Vec<TargetInfo>> {
	get_json(port, "/json/list").await
}

/// Returns the first attachable page target.
pub async fn first_page_target(port: u16) -> Result<TargetInfo> {
	list_targets(port)
		.await?
		.into_iter()
		.find(|target| target.is_page() && target.web_socket_debugger_url.is_some())
		.ok_or_else(|| Error::Context(format!("No attachable page target on port {}", port)))
}
