// crates/foresight-validator/src/directory.rs
//
// PeerDirectory: who can be polled in a subnet.
//
// A peer is pollable when the ledger has both an identity and an address
// for its uid, and the address contains something that looks like
// `ip:port`. The validator never polls itself.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use foresight_core::address::extract_address;
use foresight_core::error::ForesightError;
use foresight_core::peer::PeerInfo;
use foresight_core::traits::LedgerClient;

/// Ledger-backed view of a subnet's peers.
#[derive(Clone)]
pub struct PeerDirectory {
    ledger: Arc<dyn LedgerClient>,
    /// The validator's own identity key.
    self_identity: String,
}

impl PeerDirectory {
    pub fn new(ledger: Arc<dyn LedgerClient>, self_identity: &str) -> Self {
        Self {
            ledger,
            self_identity: self_identity.to_string(),
        }
    }

    pub fn self_identity(&self) -> &str {
        &self.self_identity
    }

    /// Map a subnet name to its id.
    pub async fn resolve_subnet(&self, name: &str) -> Result<u16, ForesightError> {
        let subnet_id = self.ledger.resolve_subnet_id(name).await?;
        tracing::info!("Subnet '{}' resolved to id {}", name, subnet_id);
        Ok(subnet_id)
    }

    /// Fresh uid -> identity map for the subnet.
    pub async fn identities(&self, subnet_id: u16) -> Result<HashMap<u16, String>, ForesightError> {
        self.ledger.list_peer_identities(subnet_id).await
    }

    /// Fail with `NotRegistered` unless the validator's identity holds a uid
    /// in the subnet. Returns that uid.
    pub async fn ensure_registered(&self, subnet_id: u16) -> Result<u16, ForesightError> {
        let identities = self.identities(subnet_id).await?;
        uid_for_identity(&identities, &self.self_identity)
            .ok_or_else(|| ForesightError::NotRegistered(self.self_identity.clone()))
    }

    /// Every pollable peer in the subnet, keyed by uid.
    pub async fn list_peers(&self, subnet_id: u16) -> Result<BTreeMap<u16, PeerInfo>, ForesightError> {
        let addresses = self.ledger.list_peer_addresses(subnet_id).await?;
        let identities = self.ledger.list_peer_identities(subnet_id).await?;

        let peers = join_peers(&addresses, &identities, &self.self_identity);
        tracing::debug!(
            "Subnet {}: {} registered addresses, {} pollable peers",
            subnet_id,
            addresses.len(),
            peers.len()
        );
        Ok(peers)
    }
}

/// The uid currently assigned to `identity`, if any.
pub fn uid_for_identity(identities: &HashMap<u16, String>, identity: &str) -> Option<u16> {
    identities
        .iter()
        .filter(|(_, registered)| registered.as_str() == identity)
        .map(|(uid, _)| *uid)
        .min()
}

fn join_peers(
    addresses: &HashMap<u16, String>,
    identities: &HashMap<u16, String>,
    self_identity: &str,
) -> BTreeMap<u16, PeerInfo> {
    addresses
        .iter()
        .filter_map(|(uid, raw)| {
            let identity = identities.get(uid)?;
            if identity == self_identity {
                return None;
            }
            let address = extract_address(raw)?;
            Some((
                *uid,
                PeerInfo {
                    uid: *uid,
                    address,
                    identity: identity.clone(),
                },
            ))
        })
        .collect()
}
