//! Crate-wide error types shared across the token lifecycle, provider clients, and sinks.

// self
use crate::{_prelude::*, provider::ProviderErrorKind, store::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Another invocation held the token lock for longer than the configured timeout.
	#[error("Timed out after {waited:?} waiting for token lock {}.", .path.display())]
	LockTimeout {
		/// Marker file that could not be created.
		path: PathBuf,
		/// How long the caller waited before giving up.
		waited: std::time::Duration,
	},
	/// No token cache exists and the bootstrap refresh token is not configured.
	#[error("No token cache exists and `{key}` is not configured.")]
	MissingBootstrapToken {
		/// Configuration key that must carry the bootstrap refresh token.
		key: String,
	},
	/// The token cache exists but does not hold a valid token state document.
	#[error("Token cache {} is unreadable: {message}.", .path.display())]
	CacheCorrupt {
		/// Cache file path.
		path: PathBuf,
		/// Parser or reader diagnostic.
		message: String,
	},
	/// A refresh is required but the cached state has no refresh token.
	#[error("Token cache has no refresh token; run the authorization bootstrap again.")]
	MissingRefreshToken,
	/// The provider rejected the refresh (or code exchange) request.
	#[error("Token endpoint rejected the refresh with status {status}: {body}.")]
	RefreshRejected {
		/// HTTP status, or the provider envelope status when the HTTP layer reported success.
		status: u16,
		/// Raw response body.
		body: String,
		/// Heuristic classification of the rejection.
		kind: ProviderErrorKind,
	},
	/// The provider answered a refresh successfully but omitted a rotated secret.
	#[error("Token endpoint response is missing `{field}`.")]
	IncompleteRefreshResponse {
		/// Missing field name.
		field: &'static str,
	},
	/// No account id could be resolved from the cache, the response, or configuration.
	#[error("No account id is available for this provider.")]
	MissingAccountId,
	/// The provider rejected the authorization code exchange.
	#[error("Authorization was rejected with status {status}: {body}.")]
	AuthorizationRejected {
		/// HTTP status, or the provider envelope status.
		status: u16,
		/// Raw response body or provider error description.
		body: String,
	},
	/// The user or provider declined the authorization request.
	#[error("Authorization was denied: {reason}.")]
	AuthorizationDenied {
		/// Provider `error` code and description, or why the redirect was unusable.
		reason: String,
	},
	/// The `state` returned on the redirect does not match the pending session.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// A provider data API answered with a non-success status.
	#[error("{endpoint} responded with status {status}: {body}.")]
	ApiRejected {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// HTTP status, or the provider envelope status.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// A provider response could not be decoded.
	#[error("{endpoint} returned malformed JSON.")]
	MalformedResponse {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure, including the failing JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Maps the error onto the coarse failure taxonomy used for operator hints.
	pub fn class(&self) -> ErrorClass {
		match self {
			Self::Config(_) | Self::MissingBootstrapToken { .. } => ErrorClass::Configuration,
			Self::Storage(_) | Self::CacheCorrupt { .. } => ErrorClass::Storage,
			Self::LockTimeout { .. } => ErrorClass::Concurrency,
			Self::Transport(_) => ErrorClass::Transport,
			Self::MissingRefreshToken
			| Self::RefreshRejected { .. }
			| Self::IncompleteRefreshResponse { .. }
			| Self::MissingAccountId
			| Self::AuthorizationRejected { .. }
			| Self::AuthorizationDenied { .. }
			| Self::StateMismatch
			| Self::ApiRejected { .. }
			| Self::MalformedResponse { .. } => ErrorClass::ProviderRejection,
		}
	}

	/// Returns true when re-running the same invocation later may succeed unchanged.
	pub fn is_retryable(&self) -> bool {
		matches!(self.class(), ErrorClass::Concurrency | ErrorClass::Transport)
	}
}

/// Coarse failure classes surfaced to operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
	/// Missing or invalid configuration.
	Configuration,
	/// Cache or data file unreadable or unwritable.
	Storage,
	/// Lock wait timed out.
	Concurrency,
	/// Provider refused the request or answered with an unusable payload.
	ProviderRejection,
	/// Network-level failure.
	Transport,
}
impl ErrorClass {
	/// Returns a stable label for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Configuration => "configuration",
			Self::Storage => "storage",
			Self::Concurrency => "concurrency",
			Self::ProviderRejection => "provider_rejection",
			Self::Transport => "transport",
		}
	}
}
impl Display for ErrorClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required configuration key is absent or blank.
	#[error("Configuration key `{key}` is not set.")]
	MissingKey {
		/// Missing key name.
		key: String,
	},
	/// A configuration value could not be interpreted.
	#[error("Configuration key `{key}` has an invalid value: {reason}.")]
	InvalidValue {
		/// Offending key name.
		key: String,
		/// Why the value was rejected.
		reason: String,
	},
	/// A configured URL could not be parsed.
	#[error("`{value}` is not a valid URL.")]
	InvalidUrl {
		/// Raw value that failed to parse.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
	/// The `.env` file exists but could not be read.
	#[error("Failed to read env file {}.", .path.display())]
	DotenvRead {
		/// Env file path.
		path: PathBuf,
		/// Underlying loader failure.
		#[source]
		source: dotenvy::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while talking to the provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}
