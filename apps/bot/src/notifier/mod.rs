//! Notifier Adapter: delivers a composed reminder message to an owner.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::record::OwnerKey;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {description}")]
    Api { status: u16, description: String },

    #[error("Delivery timed out")]
    Timeout,
}

/// One attempt per call; callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, owner: OwnerKey, text: &str) -> Result<(), DeliveryError>;
}
