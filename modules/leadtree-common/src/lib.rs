pub mod types;
pub mod config;
pub mod error;
pub mod ids;

pub use types::*;
pub use config::Config;
pub use error::LeadTreeError;
pub use ids::{new_hash, new_id, random_color, short_hash};
