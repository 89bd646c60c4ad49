// crates/foresight-client/src/lib.rs
//
// foresight-client: Production implementations of the validator's remote
// collaborators.
//
// `HttpLedgerClient` talks to a ledger gateway using the `{method, params}`
// JSON envelope; `HttpPeerRpc` calls a peer's `generate` method over HTTP.

pub mod envelope;
pub mod ledger;
pub mod peer;

pub use envelope::{JsonRpcRequest, JsonRpcResponse};
pub use ledger::HttpLedgerClient;
pub use peer::HttpPeerRpc;
