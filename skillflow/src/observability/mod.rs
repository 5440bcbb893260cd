//! Observability utilities.

mod logging;

pub use logging::{init_tracing, TracingOptions, ENV_LOG, ENV_RUST_LOG};
