//! Shared fixtures for the integration tests.

#![allow(dead_code)]

// std
use std::{fs, path::Path, sync::Arc, time::Duration as StdDuration};
// crates.io
use httpmock::prelude::*;
use serde_json::Value;
// self
use lifeops_ingest::{
	auth::{ClientId, Credential, ProviderId},
	flows::{BootstrapSeed, TokenManager},
	http::ReqwestHttpClient,
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, ProviderDescriptor, ProviderQuirks,
		WithingsStrategy,
	},
	store::{FileCache, FileLock},
	url::Url,
};

pub const CLIENT_ID: &str = "23ABCD";
pub const CLIENT_SECRET: &str = "client-secret";
pub const FITBIT_CACHE: &str = "fitbit_token.json";
pub const WITHINGS_CACHE: &str = "withings_token.json";

fn url(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock server URL should parse.")
}

pub fn fitbit_descriptor(server: &MockServer) -> ProviderDescriptor {
	ProviderDescriptor::builder(ProviderId::new("fitbit").expect("Provider id should be valid."))
		.authorization_endpoint(url(server, "/oauth2/authorize"))
		.token_endpoint(url(server, "/oauth2/token"))
		.api_base(url(server, "/"))
		.scopes(["activity", "heartrate", "sleep"])
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretBasic)
		.build()
		.expect("Fitbit mock descriptor should build.")
}

pub fn withings_descriptor(server: &MockServer) -> ProviderDescriptor {
	ProviderDescriptor::builder(ProviderId::new("withings").expect("Provider id should be valid."))
		.authorization_endpoint(url(server, "/oauth2_user/authorize2"))
		.token_endpoint(url(server, "/v2/oauth2"))
		.api_base(url(server, "/"))
		.scopes(["user.metrics"])
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
		.quirks(ProviderQuirks { scope_delimiter: ',', ..Default::default() })
		.build()
		.expect("Withings mock descriptor should build.")
}

fn credential() -> Credential {
	Credential::new(ClientId::new(CLIENT_ID).expect("Client id should be valid."), CLIENT_SECRET)
}

fn assemble(
	descriptor: ProviderDescriptor,
	strategy: Arc<dyn lifeops_ingest::provider::ProviderStrategy>,
	data_dir: &Path,
	bootstrap: Option<&str>,
) -> TokenManager {
	let id = descriptor.id.to_string();
	let key = format!("{}_REFRESH_TOKEN", id.to_ascii_uppercase());
	let store = Arc::new(FileCache::new(data_dir.join(format!("{id}_token.json"))));
	let lock = FileLock::new(data_dir.join(format!(".{id}_token.lock")))
		.with_poll_interval(StdDuration::from_millis(20))
		.with_timeout(StdDuration::from_secs(10));
	let http_client = ReqwestHttpClient::new().expect("HTTP client should build.");
	let mut seed = BootstrapSeed::new(key);

	if let Some(token) = bootstrap {
		seed = seed.with_refresh_token(token);
	}

	TokenManager::with_http_client(descriptor, strategy, credential(), store, lock, http_client)
		.with_bootstrap(seed)
}

/// Fitbit-shaped manager whose cache and lock live in `data_dir`.
pub fn fitbit_manager(server: &MockServer, data_dir: &Path, bootstrap: Option<&str>) -> TokenManager {
	assemble(fitbit_descriptor(server), Arc::new(DefaultProviderStrategy), data_dir, bootstrap)
}

/// Withings-shaped manager whose cache and lock live in `data_dir`.
pub fn withings_manager(
	server: &MockServer,
	data_dir: &Path,
	bootstrap: Option<&str>,
) -> TokenManager {
	assemble(withings_descriptor(server), Arc::new(WithingsStrategy), data_dir, bootstrap)
}

/// Fitbit token endpoint success body.
pub fn fitbit_token_body(access: &str, refresh: &str, expires_in: i64, user_id: Option<&str>) -> String {
	let mut body = serde_json::json!({
		"access_token": access,
		"refresh_token": refresh,
		"expires_in": expires_in,
		"scope": "activity heartrate sleep",
		"token_type": "Bearer",
	});

	if let Some(user_id) = user_id {
		body["user_id"] = Value::from(user_id);
	}

	body.to_string()
}

pub fn read_json(path: &Path) -> Value {
	let raw = fs::read_to_string(path).expect("JSON file should be readable.");

	serde_json::from_str(&raw).expect("JSON file should parse.")
}

/// Names of temp files left next to the data files.
pub fn temp_files(dir: &Path) -> Vec<String> {
	fs::read_dir(dir)
		.expect("Data dir should be readable.")
		.filter_map(|entry| entry.ok())
		.map(|entry| entry.file_name().to_string_lossy().into_owned())
		.filter(|name| name.ends_with(".tmp"))
		.collect()
}

pub fn basic_auth_header() -> String {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::STANDARD};

	format!("Basic {}", STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}")))
}
