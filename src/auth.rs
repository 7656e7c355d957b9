//! Auth-domain identifiers, client credentials, and token state models.

pub mod credential;
pub mod id;
pub mod token;

pub use credential::*;
pub use id::*;
pub use token::{secret::*, state::*};
