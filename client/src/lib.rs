//! The wallet's view of the ledger network.
//!
//! [`NodeApi`] is the only way the wallet talks to a node. [`HttpNodeClient`]
//! implements it over JSON-RPC; tests substitute an in-memory ledger.

pub mod api;
pub mod error;
pub mod http;
pub mod options;

pub use api::{LedgerInclusionState, NodeApi, NodeInfo, OutputWithMetadata};
pub use error::ClientError;
pub use http::HttpNodeClient;
pub use options::ClientOptions;
