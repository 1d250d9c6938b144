//! Forwarding of document batches to the external document store.
//!
//! [`BatchSink`] is the seam the orchestrator sends through. [`HttpForwarder`] is
//! the production sink: one POST per batch to the bulk-import endpoint.

use crate::config::{ForwarderConfig, PayloadKeys};
use crate::error::Result;
use crate::types::Document;
use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::time::Duration;

/// Destination for document batches
///
/// `send` reports success as a boolean and never returns an error: every failure
/// mode (rejection, timeout, transport) is a `false` and is logged by the sink.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Deliver one batch for the given client
    async fn send(&self, client_id: &str, business_name: &str, documents: &[Document]) -> bool;
}

/// Bulk-import request body
struct ImportPayload<'a> {
    keys: PayloadKeys,
    client_id: &'a str,
    business_name: &'a str,
    data: &'a [Document],
}

impl Serialize for ImportPayload<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (client_key, business_key) = self.keys.keys();
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(client_key, self.client_id)?;
        map.serialize_entry(business_key, self.business_name)?;
        map.serialize_entry("data", self.data)?;
        map.end()
    }
}

/// HTTP sink posting batches to the document store's bulk-import endpoint
#[derive(Clone, Debug)]
pub struct HttpForwarder {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    payload_keys: PayloadKeys,
}

impl HttpForwarder {
    /// Build a forwarder for the configured endpoint
    pub fn new(config: &ForwarderConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            url: config.import_url(),
            timeout: config.timeout,
            payload_keys: config.payload_keys,
        })
    }

    /// Full bulk-import URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BatchSink for HttpForwarder {
    async fn send(&self, client_id: &str, business_name: &str, documents: &[Document]) -> bool {
        let payload = ImportPayload {
            keys: self.payload_keys,
            client_id,
            business_name,
            data: documents,
        };

        let url = &self.url;
        let result = self
            .client
            .post(url)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await;

        match result {
            // Only a plain 200 counts as an accepted batch
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                tracing::debug!(
                    url = %url,
                    client_id,
                    documents = documents.len(),
                    "batch forwarded"
                );
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error_msg = format!("document store returned status {status}: {body}");
                tracing::warn!(url = %url, client_id, error = %error_msg, "batch rejected");
                false
            }
            Err(e) if e.is_timeout() => {
                let error_msg = format!("request timed out after {:?}", self.timeout);
                tracing::warn!(url = %url, client_id, error = %error_msg, "batch timeout");
                false
            }
            Err(e) => {
                let error_msg = format!("failed to send batch: {e}");
                tracing::warn!(url = %url, client_id, error = %error_msg, "batch failed");
                false
            }
        }
    }
}
