//! Access token resolution with single-flight guards, the token lock, and rotation.
//!
//! [`TokenManager::access_token`] is what pull jobs call. Each request takes the in-process guard
//! and the cross-process lock, seeds the cache if needed, and either reuses the cached access
//! token or redeems the single-use refresh token. The rotated state is saved before anything
//! else can fail, because the previous refresh token is dead the moment the provider answers.

mod metrics;

pub use self::metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AccessGrant, RefreshReason, TokenSecret},
	flows::TokenManager,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl TokenManager {
	/// Returns a currently valid access token and account id, refreshing when necessary.
	pub async fn access_token(&self) -> Result<AccessGrant> {
		self.resolve(false, "access_token").await
	}

	/// Redeems the refresh token even when the cached access token is still valid.
	pub async fn force_refresh(&self) -> Result<AccessGrant> {
		self.resolve(true, "force_refresh").await
	}

	async fn resolve(&self, force: bool, stage: &'static str) -> Result<AccessGrant> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, stage, &self.descriptor.id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.refresh_metrics.record_attempt();

				let _singleflight = self.guard.lock().await;
				let _lock = self.lock.acquire().await?;
				let now = OffsetDateTime::now_utc();
				let (mut state, _) = self.load_or_seed(now)?;

				if state.account_id.is_none() {
					state.account_id = self.bootstrap.account_id.clone();
				}

				let reason = if force {
					Some(RefreshReason::Forced)
				} else {
					state.refresh_reason(now, self.options.safety_margin)
				};
				let Some(reason) = reason else {
					self.refresh_metrics.record_cache_hit();
					tracing::debug!(provider = %self.descriptor.id, "cached access token is valid");

					return state.access_grant();
				};
				let refresh_token = state
					.refresh_token
					.clone()
					.filter(|secret| !TokenSecret::is_blank(secret))
					.ok_or(Error::MissingRefreshToken)?;

				tracing::info!(
					provider = %self.descriptor.id,
					reason = reason.as_str(),
					"refreshing access token"
				);

				let grant = self.token_endpoint().refresh(&refresh_token).await?;

				state.rotate(grant, now);
				self.store.save(&state)?;
				self.refresh_metrics.record_refresh();

				tracing::info!(
					provider = %self.descriptor.id,
					account = state.account_id.as_deref().unwrap_or("-"),
					expires_at = ?state.expires_at,
					"access token rotated"
				);

				state.access_grant()
			})
			.await;

		if result.is_err() {
			self.refresh_metrics.record_failure();
		}

		obs::finish_flow(KIND, result)
	}
}
