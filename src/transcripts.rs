//! Earnings-call transcript provider client

use crate::session::TranscriptSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("Transcript request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Transcript provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Deserialize)]
struct TranscriptBody {
    transcript: String,
}

/// HTTP client for the transcript provider
pub struct TranscriptClient {
    client: Client,
    base_url: String,
    token: String,
}

impl TranscriptClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, TranscriptError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    /// Fetch a transcript, surfacing every failure
    pub async fn try_fetch(
        &self,
        ticker: &str,
        year: i32,
        quarter: u8,
    ) -> Result<String, TranscriptError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("ticker", ticker.to_string()),
                ("year", year.to_string()),
                ("quarter", quarter.to_string()),
            ])
            .header("token", &self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptError::Status { status, body });
        }

        let body: TranscriptBody = response.json().await?;
        Ok(body.transcript)
    }
}

#[async_trait]
impl TranscriptSource for TranscriptClient {
    async fn fetch(&self, ticker: &str, year: i32, quarter: u8) -> String {
        match self.try_fetch(ticker, year, quarter).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(%ticker, year, quarter, error = %e, "Failed to fetch transcript");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn provider(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<Value>, StatusCode> {
        if headers.get("token").and_then(|v| v.to_str().ok()) != Some("secret") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        match (
            params.get("ticker").map(String::as_str),
            params.get("year").map(String::as_str),
            params.get("quarter").map(String::as_str),
        ) {
            (Some("AAPL"), Some("2024"), Some("1")) => Ok(Json(json!({
                "transcript": "Operator: Good afternoon and welcome to the call."
            }))),
            _ => Err(StatusCode::NOT_FOUND),
        }
    }

    async fn spawn_provider() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/transcript", get(provider));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/transcript")
    }

    #[tokio::test]
    async fn test_fetch_sends_query_and_token() {
        let url = spawn_provider().await;
        let client = TranscriptClient::new(url, "secret").unwrap();

        let text = client.fetch("AAPL", 2024, 1).await;
        assert!(text.starts_with("Operator:"));
    }

    #[tokio::test]
    async fn test_fetch_returns_empty_on_failure() {
        let url = spawn_provider().await;

        let wrong_period = TranscriptClient::new(url.clone(), "secret").unwrap();
        assert_eq!(wrong_period.fetch("AAPL", 2031, 1).await, "");
        assert!(matches!(
            wrong_period.try_fetch("AAPL", 2031, 1).await,
            Err(TranscriptError::Status { status, .. }) if status == StatusCode::NOT_FOUND
        ));

        let wrong_token = TranscriptClient::new(url, "nope").unwrap();
        assert_eq!(wrong_token.fetch("AAPL", 2024, 1).await, "");
    }

    #[tokio::test]
    async fn test_fetch_returns_empty_when_unreachable() {
        let client = TranscriptClient::new("http://127.0.0.1:9/transcript", "secret").unwrap();
        assert_eq!(client.fetch("AAPL", 2024, 1).await, "");
    }
}
