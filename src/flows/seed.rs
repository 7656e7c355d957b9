//! Seeding the token cache from the bootstrap secret.

// self
use crate::{
	_prelude::*,
	auth::TokenState,
	flows::{SeedPolicy, TokenManager},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// What happened to the cache while it was being prepared for use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedOutcome {
	/// An existing cache was loaded unchanged.
	Loaded,
	/// No cache existed; it was created from the bootstrap secret.
	Seeded,
	/// The configured bootstrap secret changed; the cache was reseeded from it.
	Reseeded,
}
impl SeedOutcome {
	/// Returns true when the cache was (re)written from the bootstrap secret.
	pub fn wrote(self) -> bool {
		!matches!(self, Self::Loaded)
	}
}

impl TokenManager {
	/// Ensures a token cache exists, seeding it from the bootstrap secret when needed.
	///
	/// Runs under the single-flight guard and the token lock. No network call is made.
	pub async fn seed(&self) -> Result<(TokenState, SeedOutcome)> {
		const KIND: FlowKind = FlowKind::Seed;

		let span = FlowSpan::new(KIND, "seed", &self.descriptor.id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _singleflight = self.guard.lock().await;
				let _lock = self.lock.acquire().await?;

				self.load_or_seed(OffsetDateTime::now_utc())
			})
			.await;

		obs::finish_flow(KIND, result)
	}

	/// Loads the cache, seeding or reseeding it first when required.
	///
	/// Callers must hold the token lock. A seed or reseed is persisted immediately so the
	/// bootstrap secret is never lost if a later step fails.
	pub(crate) fn load_or_seed(&self, now: OffsetDateTime) -> Result<(TokenState, SeedOutcome)> {
		let (state, outcome) = self.seed_locked(now)?;

		if outcome.wrote() {
			self.store.save(&state)?;

			tracing::info!(
				provider = %self.descriptor.id,
				cache = %self.store.location().display(),
				outcome = ?outcome,
				"token cache seeded from bootstrap secret"
			);
		}

		Ok((state, outcome))
	}

	fn seed_locked(&self, now: OffsetDateTime) -> Result<(TokenState, SeedOutcome)> {
		let Some(mut state) = self.store.load()? else {
			let refresh_token = self
				.bootstrap
				.refresh_token
				.clone()
				.ok_or_else(|| Error::MissingBootstrapToken { key: self.bootstrap.key.clone() })?;
			let state = TokenState::seeded(refresh_token, self.bootstrap.account_id.clone(), now);

			return Ok((state, SeedOutcome::Seeded));
		};

		if self.options.seed_policy != SeedPolicy::ReseedOnChange {
			return Ok((state, SeedOutcome::Loaded));
		}

		let Some(configured) = self.bootstrap.refresh_token.as_ref() else {
			return Ok((state, SeedOutcome::Loaded));
		};
		let configured_fingerprint = configured.fingerprint();

		match state.bootstrap_fingerprint.as_deref() {
			Some(recorded) if recorded != configured_fingerprint => {
				tracing::info!(
					provider = %self.descriptor.id,
					"configured bootstrap token changed; reseeding token cache"
				);

				state.reseed(configured.clone(), self.bootstrap.account_id.clone(), now);

				Ok((state, SeedOutcome::Reseeded))
			},
			Some(_) => Ok((state, SeedOutcome::Loaded)),
			None => {
				// Caches written before fingerprints existed adopt the current bootstrap; the
				// fingerprint is persisted with the next rotation.
				state.bootstrap_fingerprint = Some(configured_fingerprint);

				Ok((state, SeedOutcome::Loaded))
			},
		}
	}
}
