pub mod client;
pub mod events;
pub mod notify;
pub mod redirect;
pub mod relations;
pub mod store;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use events::EventLog;
pub use notify::Notifier;
pub use redirect::{GraphIdentity, Identity, RedirectResolver};
pub use relations::LeadRelations;
pub use store::LeadStore;

// Re-exported so integration tests can build fixture graphs directly.
pub use neo4rs::query;
