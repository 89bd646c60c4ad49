use thiserror::Error;

/// Validator-wide error types for Foresight.
#[derive(Debug, Error)]
pub enum ForesightError {
    /// Storage layer error (RocksDB open, read, write, iteration).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Transient network error (peer RPC, market data, ledger transport).
    #[error("Network error: {0}")]
    Network(String),

    /// A remote call did not complete within its deadline.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// A remote party answered, but not with something we can use.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid or inconsistent validator configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The named subnet does not exist on the ledger.
    #[error("Subnet not found: {0}")]
    SubnetNotFound(String),

    /// The validator's own identity is not registered in the subnet.
    #[error("Identity {0} is not registered in the subnet")]
    NotRegistered(String),

    /// A task already exists for this timestamp.
    #[error("Duplicate task for timestamp {0}")]
    DuplicateTask(u64),

    /// The peer already has an answer recorded for this task.
    #[error("Duplicate answer from {peer_id} for timestamp {timestamp}")]
    DuplicateAnswer { timestamp: u64, peer_id: String },

    /// Stored rows that do not join or decode the way they should.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// The ledger rejected or failed a weight submission.
    #[error("Ledger error: {0}")]
    Ledger(String),
}

impl ForesightError {
    /// Whether this error is a startup-fatal configuration problem.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ForesightError::Configuration(_)
                | ForesightError::SubnetNotFound(_)
                | ForesightError::NotRegistered(_)
        )
    }
}

impl From<serde_json::Error> for ForesightError {
    fn from(e: serde_json::Error) -> Self {
        ForesightError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_fatal() {
        assert!(ForesightError::SubnetNotFound("prediction".into()).is_fatal());
        assert!(ForesightError::NotRegistered("5Gx".into()).is_fatal());
        assert!(ForesightError::Configuration("zero period".into()).is_fatal());
    }

    #[test]
    fn test_transient_errors_are_not_fatal() {
        assert!(!ForesightError::Network("reset".into()).is_fatal());
        assert!(!ForesightError::Timeout(65_000).is_fatal());
        assert!(!ForesightError::Ledger("rejected".into()).is_fatal());
        assert!(!ForesightError::DuplicateTask(1000).is_fatal());
    }
}
