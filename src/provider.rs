//! Provider-facing descriptors (data), strategies (behavior), and the built-in providers.
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the authorization,
//! token, and data API endpoints, client authentication preference, scopes, and quirks.
//! `strategy` defines [`ProviderStrategy`], the hook used to decorate token requests, decode
//! provider-specific token responses, and classify rejections.

pub mod descriptor;
pub mod kind;
pub mod strategy;

pub use descriptor::*;
pub use kind::*;
pub use strategy::*;
