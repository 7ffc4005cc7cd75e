//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the wallet (clock, node, storage) sits behind
//! a trait. This crate provides implementations that:
//! - return deterministic values,
//! - can be steered programmatically,
//! - never touch the filesystem or network.

pub mod clock;
pub mod node;
pub mod store;

pub use clock::NullClock;
pub use node::NullNode;
pub use store::NullStore;
