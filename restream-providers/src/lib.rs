// Restream platform clients
//
// Pure HTTP clients for the external platforms the relay service talks to:
// - source: the streaming platform that emits stream.online/offline webhooks
// - destination: the live platform the stream is relayed into
// - announce: the chat webhook sink used for announcements and bot replies
// - scheduler: the scheduling SaaS used for timed reauth/resubscribe callbacks
//
// Clients are independent of the session layer and can be used standalone.

// Shared error types
pub mod error;

// HTTP clients
pub mod announce;
pub mod destination;
pub mod scheduler;
pub mod source;

// Re-export client types for convenience
pub use announce::AnnounceClient;
pub use destination::{DestinationClient, DestinationOAuth};
pub use error::ProviderClientError;
pub use scheduler::SchedulerClient;
pub use source::SourceClient;
