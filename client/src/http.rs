//! JSON-RPC node client over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tessera_types::{Bech32Address, OutputId, SignedTransaction, TransactionId};

use crate::api::{LedgerInclusionState, NodeApi, NodeInfo, OutputWithMetadata};
use crate::{ClientError, ClientOptions};

/// HTTP client for a set of nodes speaking JSON-RPC.
///
/// Requests go to the first node; on a transport failure the next node is
/// tried. Node-level errors (the node answered with an `error`) are not retried.
#[derive(Clone)]
pub struct HttpNodeClient {
    http: reqwest::Client,
    nodes: Vec<String>,
}

impl HttpNodeClient {
    pub fn new(options: &ClientOptions) -> Result<Self, ClientError> {
        if options.nodes.is_empty() {
            return Err(ClientError::NoNodes);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            nodes: options.nodes.clone(),
        })
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Send a JSON-RPC request and return the `result` field.
    async fn rpc_call(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ClientError> {
        let mut body = params;
        body.as_object_mut()
            .ok_or_else(|| ClientError::Request("params must be a JSON object".into()))?
            .insert("action".to_string(), serde_json::json!(action));

        let mut last_error = ClientError::NoNodes;
        for node in &self.nodes {
            match self.post(node, &body).await {
                Ok(value) => return Ok(value),
                Err(e @ (ClientError::Request(_) | ClientError::Status(_) | ClientError::Timeout)) => {
                    tracing::warn!(node = %node, action, error = %e, "node request failed, trying next");
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    async fn post(&self, node: &str, body: &serde_json::Value) -> Result<serde_json::Value, ClientError> {
        let response = self.http.post(node).json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::Request(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("invalid JSON response: {e}")))?;

        if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
            if json.get("not_found").and_then(|v| v.as_bool()).unwrap_or(false) {
                return Err(ClientError::NotFound(err.to_string()));
            }
            return Err(ClientError::Node(err.to_string()));
        }

        Ok(json.get("result").cloned().unwrap_or(json))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<T, ClientError> {
        let result = self.rpc_call(action, params).await?;
        serde_json::from_value(result)
            .map_err(|e| ClientError::InvalidResponse(format!("invalid {action} response: {e}")))
    }
}

#[async_trait]
impl NodeApi for HttpNodeClient {
    async fn get_info(&self) -> Result<NodeInfo, ClientError> {
        self.call("info", serde_json::json!({})).await
    }

    async fn get_outputs_for_address(
        &self,
        address: &Bech32Address,
    ) -> Result<Vec<OutputWithMetadata>, ClientError> {
        self.call("address_outputs", serde_json::json!({ "address": address }))
            .await
    }

    async fn get_output(&self, output_id: &OutputId) -> Result<OutputWithMetadata, ClientError> {
        self.call("output", serde_json::json!({ "output_id": output_id.to_string() }))
            .await
    }

    async fn submit_transaction(&self, transaction: &SignedTransaction) -> Result<TransactionId, ClientError> {
        let id: String = self
            .call("submit", serde_json::json!({ "transaction": transaction }))
            .await?;
        id.parse()
            .map_err(|e| ClientError::InvalidResponse(format!("invalid transaction id: {e}")))
    }

    async fn get_transaction_inclusion_state(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<LedgerInclusionState, ClientError> {
        self.call(
            "inclusion_state",
            serde_json::json!({ "transaction_id": transaction_id.to_string() }),
        )
        .await
    }

    async fn get_transaction(&self, transaction_id: &TransactionId) -> Result<SignedTransaction, ClientError> {
        self.call(
            "transaction",
            serde_json::json!({ "transaction_id": transaction_id.to_string() }),
        )
        .await
    }

    async fn request_funds_from_faucet(
        &self,
        url: &str,
        address: &Bech32Address,
    ) -> Result<String, ClientError> {
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({ "address": address }))
            .send()
            .await
            .map_err(|e| ClientError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}
