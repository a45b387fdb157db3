//! External marketplace delivery client
//!
//! Posts finished-goods intake notifications to the marketplace API. Used
//! exclusively by the outbox dispatcher; delivery happens outside any
//! database transaction.

use reqwest::Client;
use shared::IntakePayload;

use crate::config::MarketplaceConfig;

/// Client for the external marketplace intake API
#[derive(Clone)]
pub struct MarketplaceClient {
    api_endpoint: String,
    api_key: String,
    http_client: Client,
}

/// Snapshot of a successful delivery.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub status: u16,
    pub body: String,
}

/// A failed delivery attempt. `status` is absent for transport-level
/// failures that never produced an HTTP response.
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub status: Option<u16>,
    pub body: String,
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "marketplace returned {status}: {}", self.body),
            None => write!(f, "marketplace unreachable: {}", self.body),
        }
    }
}

impl MarketplaceClient {
    /// Create a new MarketplaceClient instance
    pub fn new(config: &MarketplaceConfig) -> Self {
        Self {
            api_endpoint: config.api_endpoint.clone(),
            api_key: config.api_key.clone(),
            http_client: Client::new(),
        }
    }

    /// Post one goods-received notification.
    pub async fn post_intake(
        &self,
        payload: &IntakePayload,
    ) -> Result<DeliveryReceipt, DeliveryFailure> {
        let url = format!("{}/intakes", self.api_endpoint.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryFailure {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(DeliveryReceipt {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(DeliveryFailure {
                status: Some(status.as_u16()),
                body,
            })
        }
    }
}
