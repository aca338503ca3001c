//! Client for the remote summarization endpoint.
//!
//! One POST per request: `{url, anchorText, surroundingContext}` in,
//! `{summary}` out. A response without a usable summary is still a success.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{EndpointConfig, FALLBACK_SUMMARY};
use crate::error::FetchError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub url: String,
    #[serde(default)]
    pub anchor_text: String,
    #[serde(default)]
    pub surrounding_context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub summary: Option<String>,
}

impl SummaryResponse {
    /// The summary text, or the fixed fallback when missing or empty.
    pub fn into_text(self) -> String {
        match self.summary {
            Some(s) if !s.is_empty() => s,
            _ => FALLBACK_SUMMARY.to_string(),
        }
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, FetchError>;
}

pub struct HttpSummarizer {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSummarizer {
    pub fn new(config: &EndpointConfig) -> Result<Self, FetchError> {
        let endpoint = Url::parse(&config.url)
            .map_err(|e| FetchError::InvalidEndpoint(format!("{}: {}", config.url, e)))?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, FetchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_response(&body)
    }
}

/// Decode an endpoint body. Anything but a JSON object is malformed; a
/// non-string `summary` is malformed too.
pub fn parse_response(body: &[u8]) -> Result<SummaryResponse, FetchError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(FetchError::Malformed(format!("expected object, got {}", value)));
    }
    serde_json::from_value(value).map_err(|e| FetchError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_fields() {
        let req = SummaryRequest {
            url: "https://example.com/a".into(),
            anchor_text: "a link".into(),
            surrounding_context: String::new(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["anchorText"], "a link");
        assert_eq!(json["surroundingContext"], "");
        assert_eq!(json["url"], "https://example.com/a");
    }

    #[test]
    fn missing_or_empty_summary_falls_back() {
        assert_eq!(parse_response(b"{}").unwrap().into_text(), FALLBACK_SUMMARY);
        assert_eq!(
            parse_response(br#"{"summary": ""}"#).unwrap().into_text(),
            FALLBACK_SUMMARY
        );
        assert_eq!(
            parse_response(br#"{"summary": null}"#).unwrap().into_text(),
            FALLBACK_SUMMARY
        );
        assert_eq!(parse_response(br#"{"summary": "X"}"#).unwrap().into_text(), "X");
    }

    #[test]
    fn shape_deviations_are_malformed() {
        assert!(matches!(parse_response(b"not json"), Err(FetchError::Malformed(_))));
        assert!(matches!(parse_response(b"[]"), Err(FetchError::Malformed(_))));
        assert!(matches!(
            parse_response(br#"{"summary": 3}"#),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let cfg = EndpointConfig {
            url: "not a url".into(),
            ..EndpointConfig::default()
        };
        assert!(matches!(
            HttpSummarizer::new(&cfg),
            Err(FetchError::InvalidEndpoint(_))
        ));
    }
}
