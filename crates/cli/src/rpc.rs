// Minimal JSON-RPC 2.0 client over HTTP

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Daemon answered "queue full, retry later"
pub const RETRY_LATER: i32 = 4290;

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Failed to connect to daemon at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("RPC error ({code}): {message}")]
    Remote {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },
}

impl RpcError {
    /// Retry hint attached to a backpressure rejection
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RpcError::Remote {
                code: RETRY_LATER,
                data,
                ..
            } => Some(Duration::from_millis(
                data.as_ref()
                    .and_then(|d| d.get("retry_after_ms"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(1_000),
            )),
            _ => None,
        }
    }
}

pub struct RpcClient {
    url: String,
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response: JsonRpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                url: self.url.clone(),
                source,
            })?
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;

        parse_response(response)
    }

    /// Like `call`, but retries backpressure rejections up to `retries` times,
    /// sleeping for the daemon's `retry_after_ms` hint in between
    pub async fn call_with_retry(
        &self,
        method: &str,
        params: serde_json::Value,
        retries: u32,
    ) -> Result<serde_json::Value, RpcError> {
        let mut attempt = 0;
        loop {
            match self.call(method, params.clone()).await {
                Err(e) if attempt < retries => match e.retry_after() {
                    Some(wait) => {
                        attempt += 1;
                        tokio::time::sleep(wait).await;
                    }
                    None => return Err(e),
                },
                other => return other,
            }
        }
    }
}

fn parse_response(response: JsonRpcResponse) -> Result<serde_json::Value, RpcError> {
    if let Some(error) = response.error {
        return Err(RpcError::Remote {
            code: error.code,
            message: error.message,
            data: error.data,
        });
    }
    response
        .result
        .ok_or_else(|| RpcError::Decode("No result in response".to_string()))
}
