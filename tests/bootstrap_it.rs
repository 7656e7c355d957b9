mod common;

// std
use std::collections::BTreeMap;
// crates.io
use httpmock::prelude::*;
// self
use common::*;
use lifeops_ingest::{auth::TokenSecret, error::Error, url::Url};

fn redirect_uri() -> Url {
	Url::parse("http://127.0.0.1:8080/callback").expect("Redirect URI fixture should parse.")
}

#[tokio::test]
async fn authorize_url_carries_client_scope_and_state() {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let manager = fitbit_manager(&server, dir.path(), None);
	let session = manager.start_authorization(redirect_uri());
	let query = session.authorize_url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();

	assert_eq!(session.authorize_url.path(), "/oauth2/authorize");
	assert_eq!(query.get("response_type").map(String::as_str), Some("code"));
	assert_eq!(query.get("client_id").map(String::as_str), Some(CLIENT_ID));
	assert_eq!(
		query.get("redirect_uri").map(String::as_str),
		Some("http://127.0.0.1:8080/callback")
	);
	assert_eq!(query.get("scope").map(String::as_str), Some("activity heartrate sleep"));
	assert_eq!(query.get("state"), Some(&session.state));
	assert!(!query.contains_key("code_challenge"), "PKCE is off unless the provider asks for it.");

	let other = manager.start_authorization(redirect_uri());

	assert_ne!(session.state, other.state, "Every session gets a fresh state.");
}

#[tokio::test]
async fn completed_authorization_installs_the_grant() {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/token")
				.header("authorization", basic_auth_header())
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body(fitbit_token_body("T1", "fresh", 28_800, Some("U1")));
		})
		.await;
	let manager = fitbit_manager(&server, dir.path(), None);
	let session = manager.start_authorization(redirect_uri());
	let redirect = Url::parse(&format!(
		"http://127.0.0.1:8080/callback?code=the-code&state={}",
		session.state
	))
	.expect("Redirect fixture should parse.");
	let (access, grant) = manager
		.complete_authorization(session, &redirect)
		.await
		.expect("Authorization should complete.");

	mock.assert_async().await;
	assert_eq!(access.access_token.expose(), "T1");
	assert_eq!(&*access.account_id, "U1");
	assert_eq!(grant.refresh_token.expose(), "fresh");

	let cache = read_json(&dir.path().join(FITBIT_CACHE));

	assert_eq!(cache["refresh_token"], "fresh");
	assert_eq!(cache["account_id"], "U1");
	assert_eq!(cache["bootstrap_fingerprint"], TokenSecret::new("fresh").fingerprint());

	// The installed token is served from the cache without another exchange.
	let cached = manager.access_token().await.expect("Installed token should be valid.");

	mock.assert_calls_async(1).await;
	assert_eq!(cached.access_token.expose(), "T1");
}

#[tokio::test]
async fn state_mismatch_stops_before_the_exchange() {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token");
			then.status(500);
		})
		.await;
	let manager = fitbit_manager(&server, dir.path(), None);
	let session = manager.start_authorization(redirect_uri());
	let redirect = Url::parse("http://127.0.0.1:8080/callback?code=the-code&state=forged")
		.expect("Redirect fixture should parse.");
	let err = manager
		.complete_authorization(session, &redirect)
		.await
		.expect_err("Forged state must be rejected.");

	mock.assert_calls_async(0).await;
	assert!(matches!(err, Error::StateMismatch));
	assert!(!dir.path().join(FITBIT_CACHE).exists());
}

#[tokio::test]
async fn rejected_code_exchange_is_reported() {
	let server = MockServer::start_async().await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"errors\":[{\"errorType\":\"invalid_grant\",\"message\":\"Authorization code expired\"}]}");
		})
		.await;
	let manager = fitbit_manager(&server, dir.path(), None);
	let session = manager.start_authorization(redirect_uri());
	let redirect = Url::parse(&format!(
		"http://127.0.0.1:8080/callback?code=stale&state={}",
		session.state
	))
	.expect("Redirect fixture should parse.");
	let err = manager
		.complete_authorization(session, &redirect)
		.await
		.expect_err("Rejected exchange must fail.");

	mock.assert_async().await;
	assert!(matches!(err, Error::AuthorizationRejected { status: 400, ref body } if body.contains("expired")));
	assert!(!dir.path().join(FITBIT_CACHE).exists());
}
