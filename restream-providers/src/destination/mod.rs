//! Destination live platform client
//!
//! Pure HTTP client for the live platform relays are pushed into:
//! ingestion endpoint (live stream) management, broadcast lifecycle
//! (create/bind/retitle), and the OAuth token flows backing them.

mod client;
pub mod oauth;
pub mod types;

pub use client::DestinationClient;
pub use oauth::DestinationOAuth;
pub use types::*;
