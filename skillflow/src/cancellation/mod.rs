//! Cooperative cancellation.
//!
//! A run owns one [`CancellationToken`]. The scheduler polls it at the start
//! of every level and the retry policy before every attempt.

mod token;

pub use token::CancellationToken;
