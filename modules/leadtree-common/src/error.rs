use thiserror::Error;

/// Error taxonomy for the lead store and the flows composed on top of it.
///
/// Point lookups return `Ok(None)` for absence; `NotFound` is reserved for
/// operations that require a referenced entity to exist (the parent and
/// user of a new lead, the target of a redirected hash).
#[derive(Error, Debug)]
pub enum LeadTreeError {
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("Database error: {0}")]
    Database(#[from] neo4rs::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LeadTreeError {
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        LeadTreeError::NotFound {
            what,
            key: key.into(),
        }
    }
}
