//! The per-row backend: direct spreadsheet-API access.
//!
//! Each wallet is one spreadsheet, provisioned with a recognizable name
//! prefix so wallets can be discovered by listing, and a single
//! `Transactions` tab whose header row matches the fixed column order.
//! Row lookup for update/delete is a linear scan of the id column: O(n)
//! per mutation, which is fine at personal-finance volumes (hundreds to
//! low thousands of rows) — a scaling boundary, not a bug.

use crate::error::StoreError;
use crate::model::{Account, Transaction};
use crate::store::{record, RemoteStore, TokenProvider};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Name prefix for provisioned spreadsheets; discovery searches for it.
const WALLET_PREFIX: &str = "Pocketsheet";
/// The tab holding transaction rows.
const SHEET_TAB: &str = "Transactions";

const SHEETS_BASE: &str = "https://sheets.googleapis.com";
const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";

pub struct SheetsStore {
    client: reqwest::Client,
    token: Arc<dyn TokenProvider>,
    sheets_base: String,
    drive_base: String,
}

impl SheetsStore {
    pub fn new(token: Arc<dyn TokenProvider>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token,
            sheets_base: SHEETS_BASE.to_string(),
            drive_base: DRIVE_BASE.to_string(),
        })
    }

    /// Points both APIs at alternate base URLs. Testing hook.
    pub fn with_bases(
        mut self,
        sheets_base: impl Into<String>,
        drive_base: impl Into<String>,
    ) -> Self {
        self.sheets_base = sheets_base.into();
        self.drive_base = drive_base.into();
        self
    }

    async fn get_json(&self, url: String) -> Result<Value, StoreError> {
        let token = self.token.access_token().await?;
        let response = self.client.get(&url).bearer_auth(token).send().await?;
        parse_response(response).await
    }

    async fn send_json(
        &self,
        request: reqwest::RequestBuilder,
        body: &Value,
    ) -> Result<Value, StoreError> {
        let token = self.token.access_token().await?;
        let response = request.bearer_auth(token).json(body).send().await?;
        parse_response(response).await
    }

    /// Scans the id column for an exact match and returns the 0-based row
    /// index (header included).
    async fn find_row(&self, spreadsheet_id: &str, tx_id: &str) -> Result<usize, StoreError> {
        let url = format!(
            "{}/v4/spreadsheets/{spreadsheet_id}/values/{SHEET_TAB}!A:A",
            self.sheets_base
        );
        let body = self.get_json(url).await?;
        let rows = body["values"].as_array().cloned().unwrap_or_default();
        rows.iter()
            .position(|row| row.get(0).and_then(Value::as_str) == Some(tx_id))
            .ok_or_else(|| StoreError::NotFound(tx_id.to_string()))
    }

    /// The numeric grid id of the transactions tab, needed for structural
    /// row deletes.
    async fn sheet_gid(&self, spreadsheet_id: &str) -> Result<i64, StoreError> {
        let url = format!("{}/v4/spreadsheets/{spreadsheet_id}", self.sheets_base);
        let meta = self.get_json(url).await?;
        meta["sheets"][0]["properties"]["sheetId"]
            .as_i64()
            .ok_or_else(|| StoreError::Format("spreadsheet metadata has no sheet id".to_string()))
    }

    async fn search_files(&self, query: &str) -> Result<Vec<(String, String)>, StoreError> {
        let token = self.token.access_token().await?;
        let response = self
            .client
            .get(format!("{}/files", self.drive_base))
            .query(&[("q", query), ("fields", "files(id, name)")])
            .bearer_auth(token)
            .send()
            .await?;
        let body = parse_response(response).await?;
        let files = body["files"].as_array().cloned().unwrap_or_default();
        Ok(files
            .iter()
            .filter_map(|f| {
                Some((
                    f["id"].as_str()?.to_string(),
                    f["name"].as_str()?.to_string(),
                ))
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl RemoteStore for SheetsStore {
    fn supports_row_ops(&self) -> bool {
        true
    }

    async fn fetch_all(&self, account: &Account) -> Result<Vec<Transaction>, StoreError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{SHEET_TAB}!A2:G",
            self.sheets_base, account.id
        );
        let body = self.get_json(url).await?;
        let rows = body["values"].as_array().cloned().unwrap_or_default();
        let transactions = rows
            .iter()
            .filter_map(Value::as_array)
            .map(|row| record::RawRecord::from_row(row).normalize())
            .collect::<Vec<_>>();
        debug!(count = transactions.len(), "fetched transactions");
        Ok(transactions)
    }

    async fn replace_all(&self, _: &Account, _: &[Transaction]) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("bulk replace"))
    }

    async fn append(
        &self,
        account: &Account,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        trace!(id = %transaction.id, "appending row");
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{SHEET_TAB}!A:G:append?valueInputOption=USER_ENTERED",
            self.sheets_base, account.id
        );
        let body = json!({ "values": [record::encode_row(transaction)] });
        self.send_json(self.client.post(&url), &body).await?;
        Ok(())
    }

    async fn update(
        &self,
        account: &Account,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        let row = self.find_row(&account.id, &transaction.id).await?;
        trace!(id = %transaction.id, row, "rewriting row");
        let range = format!("{SHEET_TAB}!A{0}:G{0}", row + 1);
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{range}?valueInputOption=USER_ENTERED",
            self.sheets_base, account.id
        );
        let body = json!({ "values": [record::encode_row(transaction)] });
        self.send_json(self.client.put(&url), &body).await?;
        Ok(())
    }

    async fn remove(&self, account: &Account, id: &str) -> Result<(), StoreError> {
        let row = self.find_row(&account.id, id).await?;
        let gid = self.sheet_gid(&account.id).await?;
        trace!(id, row, "deleting row");
        let url = format!(
            "{}/v4/spreadsheets/{}:batchUpdate",
            self.sheets_base, account.id
        );
        // A structural delete, not a clear, so row indices stay dense.
        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": gid,
                        "dimension": "ROWS",
                        "startIndex": row,
                        "endIndex": row + 1,
                    }
                }
            }]
        });
        self.send_json(self.client.post(&url), &body).await?;
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let query = format!(
            "name contains '{WALLET_PREFIX}' and \
             mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false"
        );
        let files = self.search_files(&query).await?;
        Ok(files
            .into_iter()
            .map(|(id, name)| {
                let display = name
                    .strip_prefix(WALLET_PREFIX)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(&name)
                    .to_string();
                Account::new(id, display)
            })
            .collect())
    }

    async fn create_account(&self, name: &str) -> Result<Account, StoreError> {
        let title = format!("{WALLET_PREFIX} {name}");

        // Idempotent by name: an existing spreadsheet with the computed
        // title is returned instead of provisioning a duplicate.
        let query = format!(
            "name = '{title}' and \
             mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false"
        );
        if let Some((id, _)) = self.search_files(&query).await?.into_iter().next() {
            debug!(%title, %id, "reusing existing spreadsheet");
            return Ok(Account::new(id, name));
        }

        debug!(%title, "provisioning spreadsheet");
        let create_body = json!({
            "properties": { "title": title },
            "sheets": [{
                "properties": {
                    "title": SHEET_TAB,
                    "gridProperties": { "frozenRowCount": 1 }
                }
            }]
        });
        let url = format!("{}/v4/spreadsheets", self.sheets_base);
        let created = self.send_json(self.client.post(&url), &create_body).await?;
        let id = created["spreadsheetId"]
            .as_str()
            .ok_or_else(|| {
                StoreError::Format("create response has no spreadsheetId".to_string())
            })?
            .to_string();

        // Header row, written once, in the fixed column order.
        let header_url = format!(
            "{}/v4/spreadsheets/{id}/values/{SHEET_TAB}!A1:G1?valueInputOption=USER_ENTERED",
            self.sheets_base
        );
        let header_body = json!({ "values": [record::COLUMNS] });
        self.send_json(self.client.put(&header_url), &header_body)
            .await?;

        Ok(Account::new(id, name))
    }
}

async fn parse_response(response: reqwest::Response) -> Result<Value, StoreError> {
    let status = response.status();
    if !status.is_success() {
        return Err(StoreError::Network(format!(
            "spreadsheet API answered HTTP {status}"
        )));
    }
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| StoreError::Format(format!("spreadsheet API returned invalid JSON: {e}")))
}
