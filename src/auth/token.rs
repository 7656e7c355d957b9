//! Token secrets and the persisted token state document.

pub mod secret;
pub mod state;
