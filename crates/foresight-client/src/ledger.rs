// crates/foresight-client/src/ledger.rs
//
// HttpLedgerClient: LedgerClient over a JSON gateway in front of the ledger.
//
// Methods:
//   - `subnet/resolve`    {name}                           -> {subnet_id: u16 | null}
//   - `subnet/addresses`  {subnet_id}                      -> {addresses: {uid: string}}
//   - `subnet/identities` {subnet_id}                      -> {identities: {uid: string}}
//   - `weights/submit`    {signer, subnet_id, uids, weights} -> {}
//
// Signing and transaction encoding are the gateway's business.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use foresight_core::error::ForesightError;
use foresight_core::traits::LedgerClient;

use crate::envelope::{JsonRpcRequest, JsonRpcResponse};

/// Ledger gateway client.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    /// Gateway endpoint that accepts POSTed envelopes.
    pub endpoint: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ResolveResult {
    subnet_id: Option<u16>,
}

#[derive(Deserialize)]
struct AddressesResult {
    addresses: HashMap<u16, String>,
}

#[derive(Deserialize)]
struct IdentitiesResult {
    identities: HashMap<u16, String>,
}

impl HttpLedgerClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.to_string(),
            client,
        }
    }

    /// POST one envelope and return the raw `result` value.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ForesightError> {
        let request = JsonRpcRequest::new(method, params);

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ForesightError::Network(format!("ledger {} failed: {}", method, e)))?;

        let rpc_resp: JsonRpcResponse = resp.json().await.map_err(|e| {
            ForesightError::MalformedResponse(format!("ledger {} reply: {}", method, e))
        })?;

        if !rpc_resp.success {
            return Err(ForesightError::Ledger(format!(
                "{}: {}",
                method,
                rpc_resp.error.unwrap_or_else(|| "Unknown error".to_string())
            )));
        }

        Ok(rpc_resp.result.unwrap_or(serde_json::Value::Null))
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ForesightError> {
        let result = self.call(method, params).await?;
        serde_json::from_value(result).map_err(|e| {
            ForesightError::MalformedResponse(format!("ledger {} result: {}", method, e))
        })
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn resolve_subnet_id(&self, name: &str) -> Result<u16, ForesightError> {
        let resolved: ResolveResult = self
            .call_as("subnet/resolve", json!({ "name": name }))
            .await?;
        resolved
            .subnet_id
            .ok_or_else(|| ForesightError::SubnetNotFound(name.to_string()))
    }

    async fn list_peer_addresses(
        &self,
        subnet_id: u16,
    ) -> Result<HashMap<u16, String>, ForesightError> {
        let result: AddressesResult = self
            .call_as("subnet/addresses", json!({ "subnet_id": subnet_id }))
            .await?;
        Ok(result.addresses)
    }

    async fn list_peer_identities(
        &self,
        subnet_id: u16,
    ) -> Result<HashMap<u16, String>, ForesightError> {
        let result: IdentitiesResult = self
            .call_as("subnet/identities", json!({ "subnet_id": subnet_id }))
            .await?;
        Ok(result.identities)
    }

    async fn submit_weights(
        &self,
        signer: &str,
        subnet_id: u16,
        uids: &[u16],
        weights: &[u16],
    ) -> Result<(), ForesightError> {
        if uids.len() != weights.len() {
            return Err(ForesightError::Ledger(format!(
                "{} uids but {} weights",
                uids.len(),
                weights.len()
            )));
        }
        self.call(
            "weights/submit",
            json!({
                "signer": signer,
                "subnet_id": subnet_id,
                "uids": uids,
                "weights": weights,
            }),
        )
        .await?;
        tracing::debug!("Submitted {} weights to subnet {}", uids.len(), subnet_id);
        Ok(())
    }
}
