// crates/foresight-oracle/src/kraken.rs
//
// Truth oracle backed by Kraken's public OHLC endpoint.
//
// GET {base_url}?pair={pair}&interval=1&since={minute_ts}
//
// Response shape:
//   {"error": [], "result": {"XXBTZUSD": [[time, open, high, low, close, vwap, volume, count], ...], "last": 1616662740}}
//
// The close of the last candle in the series is the observed value. Prices
// arrive as decimal strings.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use foresight_core::error::ForesightError;
use foresight_core::traits::TruthOracle;

use crate::symbols::SymbolTable;

/// Default public OHLC endpoint.
pub const DEFAULT_OHLC_URL: &str = "https://api.kraken.com/0/public/OHLC";

/// Position of the close price inside a candle array.
const CLOSE_INDEX: usize = 4;

/// HTTP client for Kraken OHLC candles.
#[derive(Debug, Clone)]
pub struct KrakenOracle {
    /// Full URL of the OHLC endpoint.
    pub base_url: String,
    symbols: SymbolTable,
    client: reqwest::Client,
}

impl KrakenOracle {
    /// Create an oracle for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, symbols: SymbolTable, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            symbols,
            client,
        }
    }

    /// Fetch the close price of the most recent one-minute candle at or
    /// after the minute containing `timestamp`.
    pub async fn fetch_close(&self, instrument: &str, timestamp: u64) -> Result<f64, ForesightError> {
        let pair = self.symbols.resolve(instrument);
        let since = timestamp - timestamp % 60;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("pair", pair.to_string()),
                ("interval", "1".to_string()),
                ("since", since.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ForesightError::Network(format!("market data request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ForesightError::Network(format!(
                "market data request returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            ForesightError::MalformedResponse(format!("market data body is not JSON: {}", e))
        })?;

        parse_close(&body, pair)
    }
}

#[async_trait]
impl TruthOracle for KrakenOracle {
    async fn fetch_observed_value(
        &self,
        category: &str,
        instrument: &str,
        timestamp: u64,
    ) -> Option<f64> {
        match self.fetch_close(instrument, timestamp).await {
            Ok(price) => Some(price),
            Err(e) => {
                tracing::warn!(
                    "No observed value for {}/{} at {}: {}",
                    category,
                    instrument,
                    timestamp,
                    e
                );
                None
            }
        }
    }
}

/// Extract the last candle's close price from an OHLC response body.
///
/// The series under `pair` is preferred; otherwise the first array-valued
/// entry of `result` is used (the provider sometimes answers under an
/// alternate pair name, and `result` also carries a numeric `last` cursor).
pub fn parse_close(body: &Value, pair: &str) -> Result<f64, ForesightError> {
    if let Some(errors) = body.get("error").and_then(Value::as_array) {
        if !errors.is_empty() {
            let joined: Vec<String> = errors
                .iter()
                .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                .collect();
            return Err(ForesightError::MalformedResponse(format!(
                "provider error: {}",
                joined.join(", ")
            )));
        }
    }

    let result = body
        .get("result")
        .and_then(Value::as_object)
        .ok_or_else(|| ForesightError::MalformedResponse("missing result".to_string()))?;

    let series = result
        .get(pair)
        .and_then(Value::as_array)
        .or_else(|| result.values().find_map(Value::as_array))
        .ok_or_else(|| ForesightError::MalformedResponse("no candle series".to_string()))?;

    let candle = series
        .last()
        .and_then(Value::as_array)
        .ok_or_else(|| ForesightError::MalformedResponse("empty candle series".to_string()))?;

    let close = candle
        .get(CLOSE_INDEX)
        .ok_or_else(|| ForesightError::MalformedResponse("candle has no close".to_string()))?;

    let price = match close {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };

    price
        .filter(|p| p.is_finite())
        .ok_or_else(|| ForesightError::MalformedResponse(format!("unparsable close {}", close)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Start a one-shot mock HTTP server. The request head it received is
    /// sent back through the returned channel.
    async fn mock_server(status: u16, body: &str) -> (String, oneshot::Receiver<String>) {
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
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        (format!("http://{}/0/public/OHLC", addr), rx)
    }

    fn oracle(url: &str) -> KrakenOracle {
        KrakenOracle::new(url, SymbolTable::default(), Duration::from_secs(5))
    }

    #[test]
    fn test_parse_last_close() {
        let body = json!({
            "error": [],
            "result": {
                "XXBTZUSD": [
                    [1000, "65000.0", "65010.0", "64990.0", "65001.5", "65000.0", "1.2", 10],
                    [1060, "65001.5", "65300.0", "65000.0", "65232.25", "65100.0", "0.8", 7]
                ],
                "last": 1060
            }
        });
        assert_eq!(parse_close(&body, "XXBTZUSD").unwrap(), 65232.25);
    }

    #[test]
    fn test_parse_numeric_close_and_alternate_key() {
        let body = json!({
            "error": [],
            "result": {"last": 1060, "XBTUSD": [[1060, 1, 2, 0.5, 1.75, 1, 1, 1]]}
        });
        assert_eq!(parse_close(&body, "XXBTZUSD").unwrap(), 1.75);
    }

    #[test]
    fn test_provider_error_payload() {
        let body = json!({"error": ["EQuery:Unknown asset pair"]});
        let err = parse_close(&body, "XXBTZUSD").unwrap_err();
        match err {
            ForesightError::MalformedResponse(msg) => assert!(msg.contains("Unknown asset pair")),
            other => panic!("Expected MalformedResponse, got: {:?}", other),
        }
    }

    #[test]
    fn test_empty_result_is_error() {
        assert!(parse_close(&json!({"error": [], "result": {}}), "XXBTZUSD").is_err());
        assert!(parse_close(&json!({"error": [], "result": {"XXBTZUSD": []}}), "XXBTZUSD").is_err());
        assert!(parse_close(&json!({"error": []}), "XXBTZUSD").is_err());
    }

    #[test]
    fn test_garbage_close_is_error() {
        let body = json!({"error": [], "result": {"XXBTZUSD": [[1060, "a", "b", "c", "not-a-price"]]}});
        assert!(parse_close(&body, "XXBTZUSD").is_err());
    }

    #[tokio::test]
    async fn test_fetch_sends_mapped_pair_and_minute() {
        let body = r#"{"error":[],"result":{"XXBTZUSD":[[1020,"1","2","0","65232.25","1","1",1]],"last":1020}}"#;
        let (url, request) = mock_server(200, body).await;

        let value = oracle(&url).fetch_observed_value("crypto", "BTCUSDT", 1059).await;
        assert_eq!(value, Some(65232.25));

        let head = request.await.unwrap();
        let request_line = head.lines().next().unwrap();
        assert!(request_line.starts_with("GET /0/public/OHLC?"));
        assert!(request_line.contains("pair=XXBTZUSD"));
        assert!(request_line.contains("interval=1"));
        assert!(request_line.contains("since=1020"));
    }

    #[tokio::test]
    async fn test_non_200_is_none() {
        let (url, _request) = mock_server(503, r#"{"error":["EService:Unavailable"]}"#).await;
        assert_eq!(oracle(&url).fetch_observed_value("crypto", "BTCUSDT", 1000).await, None);
    }

    #[tokio::test]
    async fn test_provider_error_is_none() {
        let (url, _request) = mock_server(200, r#"{"error":["EGeneral:Invalid arguments"]}"#).await;
        assert_eq!(oracle(&url).fetch_observed_value("crypto", "BTCUSDT", 1000).await, None);
    }

    #[tokio::test]
    async fn test_connection_error_is_network_error() {
        let oracle = oracle("http://127.0.0.1:1"); // Nothing listening
        match oracle.fetch_close("BTCUSDT", 1000).await.unwrap_err() {
            ForesightError::Network(msg) => assert!(msg.contains("request failed")),
            other => panic!("Expected Network error, got: {:?}", other),
        }
        assert_eq!(oracle.fetch_observed_value("crypto", "BTCUSDT", 1000).await, None);
    }
}
