// crates/foresight-core/src/peer.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// A reachable `ip:port` pair parsed out of a peer's registered address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub ip: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    /// HTTP base URL for the peer's service, e.g. `http://10.0.0.2:8000`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// A peer that can be polled: registered on the ledger with both an
/// identity and a parseable network address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Ledger-assigned numeric id, used when submitting weights.
    pub uid: u16,
    pub address: PeerAddress,
    /// Ledger identity key. Answers are recorded under this string.
    pub identity: String,
}
