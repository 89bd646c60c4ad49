// crates/foresight-scoring/src/weights.rs
//
// Weight vectors in the shape the ledger accepts them.
//
// Scores are keyed by peer identity, but the ledger takes weights by
// numeric uid. The identity -> uid mapping must come from a fresh ledger
// lookup at submission time, since uids are reassigned as peers
// deregister and register.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Parallel uid / weight vectors, sorted by uid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightVector {
    pub uids: Vec<u16>,
    pub weights: Vec<u16>,
    /// Scored identities that no longer have a uid.
    pub unresolved: Vec<String>,
}

impl WeightVector {
    /// Map identity-keyed scores onto uids using `identities` (uid -> identity).
    pub fn from_scores(scores: &BTreeMap<String, u16>, identities: &HashMap<u16, String>) -> Self {
        let by_identity: HashMap<&str, u16> = identities
            .iter()
            .map(|(uid, identity)| (identity.as_str(), *uid))
            .collect();

        let mut pairs = Vec::with_capacity(scores.len());
        let mut unresolved = Vec::new();
        for (identity, weight) in scores {
            match by_identity.get(identity.as_str()) {
                Some(uid) => pairs.push((*uid, *weight)),
                None => unresolved.push(identity.clone()),
            }
        }
        pairs.sort_unstable_by_key(|(uid, _)| *uid);

        Self {
            uids: pairs.iter().map(|(uid, _)| *uid).collect(),
            weights: pairs.iter().map(|(_, weight)| *weight).collect(),
            unresolved,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.uids.len()
    }
}
