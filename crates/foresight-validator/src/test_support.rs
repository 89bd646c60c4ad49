// crates/foresight-validator/src/test_support.rs
//
// In-process stand-ins for the ledger, peers, and market data, shared by the
// unit tests of this crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use foresight_core::error::ForesightError;
use foresight_core::peer::PeerInfo;
use foresight_core::task::ForecastRequest;
use foresight_core::traits::{LedgerClient, PeerRpc, TruthOracle};
use foresight_store::RocksStore;

/// One recorded `submit_weights` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub signer: String,
    pub subnet_id: u16,
    pub uids: Vec<u16>,
    pub weights: Vec<u16>,
}

/// Ledger with a single subnet named `prediction`.
#[derive(Default)]
pub struct StubLedger {
    pub subnet_id: u16,
    pub addresses: HashMap<u16, String>,
    pub identities: HashMap<u16, String>,
    pub submissions: Mutex<Vec<Submission>>,
    pub reject_submissions: bool,
}

impl StubLedger {
    pub fn new(subnet_id: u16) -> Self {
        Self {
            subnet_id,
            ..Self::default()
        }
    }

    pub fn with_peer(mut self, uid: u16, address: &str, identity: &str) -> Self {
        self.addresses.insert(uid, address.to_string());
        self.identities.insert(uid, identity.to_string());
        self
    }

    pub fn with_address_only(mut self, uid: u16, address: &str) -> Self {
        self.addresses.insert(uid, address.to_string());
        self
    }

    pub fn with_identity_only(mut self, uid: u16, identity: &str) -> Self {
        self.identities.insert(uid, identity.to_string());
        self
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for StubLedger {
    async fn resolve_subnet_id(&self, name: &str) -> Result<u16, ForesightError> {
        if name == "prediction" {
            Ok(self.subnet_id)
        } else {
            Err(ForesightError::SubnetNotFound(name.to_string()))
        }
    }

    async fn list_peer_addresses(&self, _subnet_id: u16) -> Result<HashMap<u16, String>, ForesightError> {
        Ok(self.addresses.clone())
    }

    async fn list_peer_identities(&self, _subnet_id: u16) -> Result<HashMap<u16, String>, ForesightError> {
        Ok(self.identities.clone())
    }

    async fn submit_weights(
        &self,
        signer: &str,
        subnet_id: u16,
        uids: &[u16],
        weights: &[u16],
    ) -> Result<(), ForesightError> {
        if self.reject_submissions {
            return Err(ForesightError::Ledger("rate limited".to_string()));
        }
        self.submissions.lock().unwrap().push(Submission {
            signer: signer.to_string(),
            subnet_id,
            uids: uids.to_vec(),
            weights: weights.to_vec(),
        });
        Ok(())
    }
}

/// How a stub peer reacts to `generate`.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Answer(f64, Duration),
    Fail,
    Hang,
    Panic,
}

/// Peers keyed by identity; unknown identities fail.
#[derive(Default)]
pub struct StubRpc {
    pub behaviors: HashMap<String, Behavior>,
    pub calls: Mutex<Vec<(String, ForecastRequest)>>,
}

impl StubRpc {
    pub fn with(mut self, identity: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(identity.to_string(), behavior);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PeerRpc for StubRpc {
    async fn generate(
        &self,
        peer: &PeerInfo,
        request: &ForecastRequest,
        _timeout: Duration,
    ) -> Result<f64, ForesightError> {
        self.calls
            .lock()
            .unwrap()
            .push((peer.identity.clone(), request.clone()));
        match self.behaviors.get(&peer.identity).copied() {
            Some(Behavior::Answer(value, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Behavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(0.0)
            }
            Some(Behavior::Panic) => panic!("peer {} blew up", peer.identity),
            Some(Behavior::Fail) | None => Err(ForesightError::Network("refused".to_string())),
        }
    }
}

/// Oracle that knows a fixed value per timestamp.
#[derive(Default)]
pub struct StubOracle {
    pub values: Mutex<BTreeMap<u64, f64>>,
    pub calls: Mutex<Vec<u64>>,
}

impl StubOracle {
    pub fn with_value(self, timestamp: u64, value: f64) -> Self {
        self.values.lock().unwrap().insert(timestamp, value);
        self
    }
}

#[async_trait]
impl TruthOracle for StubOracle {
    async fn fetch_observed_value(&self, _category: &str, _instrument: &str, timestamp: u64) -> Option<f64> {
        self.calls.lock().unwrap().push(timestamp);
        self.values.lock().unwrap().get(&timestamp).copied()
    }
}

/// Fresh RocksDB store under the system temp dir.
pub fn temp_store(label: &str) -> Arc<RocksStore> {
    let path = std::env::temp_dir().join(format!("foresight_validator_{}_{}", label, Uuid::now_v7()));
    Arc::new(RocksStore::open(path.to_str().unwrap()).unwrap())
}
