// crates/foresight-client/src/peer.rs
//
// HttpPeerRpc: PeerRpc over plain HTTP.
//
// POST http://{ip}:{port}/method/generate
//   headers: X-Target-Key: <peer identity>, X-Sender-Key: <validator identity>
//   body:    {"category": "...", "pair": "...", "timestamp": 1700000000}
//   reply:   {"answer": 65200.0}   (a numeric string is also accepted)

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use foresight_core::error::ForesightError;
use foresight_core::peer::PeerInfo;
use foresight_core::task::ForecastRequest;
use foresight_core::traits::PeerRpc;

/// Path of the forecast method on every peer.
pub const GENERATE_PATH: &str = "/method/generate";

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    answer: Value,
}

/// Calls peers' `generate` method. One client is shared across all peers.
#[derive(Debug, Clone)]
pub struct HttpPeerRpc {
    client: reqwest::Client,
    /// Identity sent as `X-Sender-Key`.
    pub sender_identity: String,
}

impl HttpPeerRpc {
    pub fn new(sender_identity: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            sender_identity: sender_identity.to_string(),
        }
    }
}

#[async_trait]
impl PeerRpc for HttpPeerRpc {
    async fn generate(
        &self,
        peer: &PeerInfo,
        request: &ForecastRequest,
        timeout: Duration,
    ) -> Result<f64, ForesightError> {
        let url = format!("{}{}", peer.address.base_url(), GENERATE_PATH);

        let resp = self
            .client
            .post(&url)
            .header("X-Target-Key", &peer.identity)
            .header("X-Sender-Key", &self.sender_identity)
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ForesightError::Timeout(timeout.as_millis() as u64)
                } else {
                    ForesightError::Network(format!("peer {} unreachable: {}", peer.address, e))
                }
            })?;

        if !resp.status().is_success() {
            return Err(ForesightError::Network(format!(
                "peer {} returned status {}",
                peer.address,
                resp.status()
            )));
        }

        let reply: GenerateReply = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                ForesightError::Timeout(timeout.as_millis() as u64)
            } else {
                ForesightError::MalformedResponse(format!("peer {} reply: {}", peer.address, e))
            }
        })?;

        parse_answer(&reply.answer).ok_or_else(|| {
            ForesightError::MalformedResponse(format!(
                "peer {} answered {}",
                peer.address, reply.answer
            ))
        })
    }
}

/// A finite number, or a string holding one.
fn parse_answer(answer: &Value) -> Option<f64> {
    let value = match answer {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_core::peer::PeerAddress;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// One-shot mock peer. Replies with `body` after `delay`; the raw request
    /// it received is sent back through the channel.
    async fn mock_peer(
        status: u16,
        body: &str,
        delay: Duration,
    ) -> (PeerInfo, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let raw = read_request(&mut stream).await;
                let _ = tx.send(raw);
                tokio::time::sleep(delay).await;
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        let peer = PeerInfo {
            uid: 3,
            address: PeerAddress::new("127.0.0.1", addr.port()),
            identity: "5PeerKey".to_string(),
        };
        (peer, rx)
    }

    /// Read one full HTTP request (head plus Content-Length body).
    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some((head, body)) = text.split_once("\r\n\r\n") {
                let length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if body.len() >= length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&raw).to_string()
    }

    fn request() -> ForecastRequest {
        ForecastRequest {
            category: "crypto".to_string(),
            instrument: "BTCUSDT".to_string(),
            timestamp: 1000,
        }
    }

    #[tokio::test]
    async fn test_numeric_answer() {
        let (peer, received) = mock_peer(200, r#"{"answer":65200.0}"#, Duration::ZERO).await;
        let rpc = HttpPeerRpc::new("5ValidatorKey");

        let value = rpc.generate(&peer, &request(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(value, 65200.0);

        let raw = received.await.unwrap();
        let lower = raw.to_ascii_lowercase();
        assert!(raw.starts_with("POST /method/generate "));
        assert!(lower.contains("x-target-key: 5peerkey"));
        assert!(lower.contains("x-sender-key: 5validatorkey"));

        let body = raw.split_once("\r\n\r\n").unwrap().1;
        let sent: Value = serde_json::from_str(body).unwrap();
        assert_eq!(sent, json!({"category": "crypto", "pair": "BTCUSDT", "timestamp": 1000}));
    }

    #[tokio::test]
    async fn test_string_answer_accepted() {
        let (peer, _received) = mock_peer(200, r#"{"answer":" 65201.5 "}"#, Duration::ZERO).await;
        let value = HttpPeerRpc::new("v")
            .generate(&peer, &request(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(value, 65201.5);
    }

    #[tokio::test]
    async fn test_garbage_answer_is_malformed() {
        let (peer, _received) = mock_peer(200, r#"{"answer":"soon"}"#, Duration::ZERO).await;
        let err = HttpPeerRpc::new("v")
            .generate(&peer, &request(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ForesightError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_answer_is_malformed() {
        let (peer, _received) = mock_peer(200, r#"{"prediction":1}"#, Duration::ZERO).await;
        let err = HttpPeerRpc::new("v")
            .generate(&peer, &request(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ForesightError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_error_status_is_network_error() {
        let (peer, _received) = mock_peer(500, r#"{}"#, Duration::ZERO).await;
        let err = HttpPeerRpc::new("v")
            .generate(&peer, &request(), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            ForesightError::Network(msg) => assert!(msg.contains("500")),
            other => panic!("Expected Network error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_peer_times_out() {
        let (peer, _received) =
            mock_peer(200, r#"{"answer":1.0}"#, Duration::from_secs(3)).await;
        let err = HttpPeerRpc::new("v")
            .generate(&peer, &request(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ForesightError::Timeout(200)));
    }

    #[test]
    fn test_parse_answer_rejects_non_finite() {
        assert_eq!(parse_answer(&json!(1.5)), Some(1.5));
        assert_eq!(parse_answer(&json!("2")), Some(2.0));
        assert_eq!(parse_answer(&json!("NaN")), None);
        assert_eq!(parse_answer(&json!("inf")), None);
        assert_eq!(parse_answer(&json!(null)), None);
        assert_eq!(parse_answer(&json!([1.0])), None);
    }
}
