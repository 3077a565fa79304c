//! Source platform client
//!
//! Pure HTTP client for the streaming platform the relays originate from:
//! stream/user/video lookups, app-token grants, and webhook-hub
//! subscription management.

mod client;
pub mod types;

pub use client::SourceClient;
pub use types::*;
