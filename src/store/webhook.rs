//! The bulk-mode backend: a deployed script endpoint ("webhook") fronting
//! the user's spreadsheet.
//!
//! The endpoint has no per-row granularity; reads return the whole data
//! set as a JSON array and writes re-send the whole data set. A non-array
//! 200 response almost always means the endpoint is not deployed publicly
//! (an HTML login page), which callers want to distinguish from a
//! transient network failure.

use crate::error::StoreError;
use crate::model::{Account, Transaction};
use crate::store::{record, RemoteStore};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

pub struct WebhookStore {
    client: reqwest::Client,
}

impl WebhookStore {
    /// Creates a store with the given client-side timeout applied to all
    /// requests. Timeout expiry is reported as a network error.
    pub fn new(timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn endpoint(account: &Account) -> Result<Url, StoreError> {
        let raw = account
            .endpoint
            .as_deref()
            .ok_or(StoreError::Unsupported("account has no webhook endpoint"))?;
        Url::parse(raw).map_err(|e| StoreError::Format(format!("invalid endpoint URL '{raw}': {e}")))
    }
}

#[async_trait::async_trait]
impl RemoteStore for WebhookStore {
    fn supports_row_ops(&self) -> bool {
        false
    }

    async fn fetch_all(&self, account: &Account) -> Result<Vec<Transaction>, StoreError> {
        let mut url = Self::endpoint(account)?;
        // Cache-buster: script endpoints sit behind aggressive edge caches.
        url.query_pairs_mut()
            .append_pair("t", &chrono::Utc::now().timestamp_millis().to_string());
        trace!(%url, "fetching full transaction set");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Network(format!(
                "endpoint answered HTTP {status}"
            )));
        }
        let body = response.text().await?;
        let value: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            StoreError::Format(
                "response is not JSON; check that the endpoint is deployed publicly".to_string(),
            )
        })?;
        let records = value.as_array().ok_or_else(|| {
            StoreError::Format("expected a JSON array of transaction records".to_string())
        })?;

        let transactions = records
            .iter()
            .map(|r| record::RawRecord::from_value(r).normalize())
            .collect::<Vec<_>>();
        debug!(count = transactions.len(), "fetched transactions");
        Ok(transactions)
    }

    async fn replace_all(
        &self,
        account: &Account,
        transactions: &[Transaction],
    ) -> Result<(), StoreError> {
        let url = Self::endpoint(account)?;
        let body: Vec<serde_json::Value> = transactions.iter().map(record::encode).collect();
        debug!(count = body.len(), "pushing full transaction set");

        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Network(format!(
                "push rejected with HTTP {status}"
            )));
        }
        Ok(())
    }

    async fn append(&self, _: &Account, _: &Transaction) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("per-row append"))
    }

    async fn update(&self, _: &Account, _: &Transaction) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("per-row update"))
    }

    async fn remove(&self, _: &Account, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("per-row delete"))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Err(StoreError::Unsupported("account discovery"))
    }

    async fn create_account(&self, _: &str) -> Result<Account, StoreError> {
        Err(StoreError::Unsupported("account provisioning"))
    }
}
