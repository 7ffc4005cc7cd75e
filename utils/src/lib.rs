//! Shared utilities for the Tessera wallet.

pub mod logging;
pub mod stats;
pub mod time;

pub use logging::{init_logging, LogFormat, LoggingError};
pub use stats::{Counter, StatsCounter, StatsSnapshot};
pub use time::format_duration;
