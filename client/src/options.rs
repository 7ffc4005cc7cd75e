//! Node connection settings.

use serde::{Deserialize, Serialize};

fn default_nodes() -> Vec<String> {
    vec!["http://127.0.0.1:14265".to_string()]
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Node endpoints, tried in order.
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,
    /// Perform proof-of-work locally instead of on the node.
    #[serde(default)]
    pub local_pow: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub faucet_url: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            local_pow: false,
            request_timeout_secs: default_request_timeout_secs(),
            faucet_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options: ClientOptions = serde_json::from_str(r#"{"local_pow": true}"#).unwrap();
        assert!(options.local_pow);
        assert_eq!(options.request_timeout_secs, 30);
        assert_eq!(options.nodes, default_nodes());
    }
}
