//! Utility functions for identifiers, digests and timestamps.

mod ids;
pub mod timestamps;

pub use ids::{generate_execution_id, generate_uuid, sha256_hex};
pub use timestamps::{elapsed_seconds, iso_timestamp, now_utc, Timestamp};
