// crates/foresight-core/src/address.rs
//
// Extraction of `ddd.ddd.ddd.ddd:port` endpoints from free-form address
// strings registered on the ledger. Registered addresses are not validated
// by the ledger, so anything may appear around (or instead of) the endpoint.

use std::sync::OnceLock;

use regex::Regex;

use crate::peer::PeerAddress;

const ENDPOINT_PATTERN: &str = r"([0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}):([0-9]+)";

static ENDPOINT: OnceLock<Option<Regex>> = OnceLock::new();

fn endpoint_regex() -> Option<&'static Regex> {
    ENDPOINT
        .get_or_init(|| Regex::new(ENDPOINT_PATTERN).ok())
        .as_ref()
}

/// Find the first `ddd.ddd.ddd.ddd:ddd` endpoint anywhere in `raw`.
///
/// Octets are 1-3 ASCII digits and are not range checked; the port is a run
/// of digits that must fit in a `u16`. Returns `None` when no endpoint is
/// present or the port does not fit.
pub fn extract_address(raw: &str) -> Option<PeerAddress> {
    let captures = endpoint_regex()?.captures(raw)?;
    let ip = captures.get(1)?.as_str();
    let port = captures.get(2)?.as_str().parse::<u16>().ok()?;
    Some(PeerAddress::new(ip, port))
}
