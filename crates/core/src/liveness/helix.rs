use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{ChannelStatus, StatusSource};
use crate::error::{PagecastError, Result};

#[derive(Debug, Clone)]
pub struct HelixCredentials {
	pub client_id: String,
	pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct HelixEndpoints {
	pub token_url: String,
	pub api_base: String,
}

impl Default for HelixEndpoints {
	fn default() -> Self {
		Self {
			token_url: "https://id.twitch.tv/oauth2/token".to_string(),
			api_base: "https://api.twitch.tv/helix".to_string(),
		}
	}
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
	access_token: String,
	#[serde(default)]
	expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
	data: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
	#[serde(default)]
	title: String,
	#[serde(rename = "type", default)]
	stream_type: String,
}

/// Twitch Helix status lookups with an app access token.
///
/// The token is requested on first use and reused for the life of the client.
pub struct HelixClient {
	http: reqwest::Client,
	credentials: HelixCredentials,
	endpoints: HelixEndpoints,
	token: OnceCell<String>,
}

impl HelixClient {
	pub fn new(credentials: HelixCredentials) -> Result<Self> {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(10))
			.build()
			.map_err(|e| PagecastError::Config(format!("failed to create HTTP client: {e}")))?;
		Ok(Self {
			http,
			credentials,
			endpoints: HelixEndpoints::default(),
			token: OnceCell::new(),
		})
	}

	pub fn with_endpoints(mut self, endpoints: HelixEndpoints) -> Self {
		self.endpoints = endpoints;
		self
	}

	async fn app_token(&self) -> Result<&str> {
		self.token.get_or_try_init(|| self.fetch_token()).await.map(String::as_str)
	}

	async fn fetch_token(&self) -> Result<String> {
		let response = self
			.http
			.post(&self.endpoints.token_url)
			.form(&[
				("client_id", self.credentials.client_id.as_str()),
				("client_secret", self.credentials.client_secret.as_str()),
				("grant_type", "client_credentials"),
			])
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(PagecastError::Query(format!("token request returned {}", response.status())));
		}

		let token: TokenResponse = response.json().await?;
		info!(target = "pagecast.liveness", expires_in = token.expires_in, "obtained app access token");
		Ok(token.access_token)
	}
}

#[async_trait]
impl StatusSource for HelixClient {
	async fn status(&self, channel: &str) -> Result<ChannelStatus> {
		let token = self.app_token().await?;
		let response = self
			.http
			.get(format!("{}/streams", self.endpoints.api_base))
			.query(&[("user_login", channel)])
			.header("Client-Id", &self.credentials.client_id)
			.bearer_auth(token)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(PagecastError::Query(format!("streams request for {channel} returned {}", response.status())));
		}

		let streams: StreamsResponse = response.json().await?;
		Ok(match streams.data.into_iter().next() {
			Some(stream) => {
				debug!(target = "pagecast.liveness", channel, stream_type = %stream.stream_type, "stream listed");
				ChannelStatus::Live { title: stream.title }
			}
			None => ChannelStatus::NotLive,
		})
	}
}
