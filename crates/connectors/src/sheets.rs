//! Order ledger stored as rows of a spreadsheet.

use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::{LedgerSchema, OrderRecord};
use fulfillment::{AppendOutcome, KeyedLocks, LedgerClient, LedgerError, append_if_absent};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::http;

/// Connection settings for the ledger spreadsheet.
#[derive(Clone)]
pub struct SheetsConfig {
    pub api_base: String,
    pub spreadsheet_id: String,
    /// OAuth access token with spreadsheet scope.
    pub access_token: String,
    /// A1 range covering the ledger columns, e.g. `Orders!A:O`.
    pub range: String,
    pub schema: LedgerSchema,
    pub timeout: Duration,
}

impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("api_base", &self.api_base)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("range", &self.range)
            .field("schema", &self.schema)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Ledger client over the spreadsheet values API.
///
/// The sheet enforces no uniqueness; `append_once` serialises per order id
/// inside this process.
pub struct SheetsLedger {
    client: Client,
    values_base: Url,
    access_token: String,
    range: String,
    schema: LedgerSchema,
    order_locks: KeyedLocks,
}

impl SheetsLedger {
    /// Creates a ledger client for the given settings.
    pub fn new(config: SheetsConfig) -> Result<Self> {
        let base = http::base_url(&config.api_base)?;
        Ok(Self {
            client: http::client(config.timeout)?,
            values_base: http::endpoint(
                &base,
                &["v4", "spreadsheets", config.spreadsheet_id.as_str(), "values"],
            ),
            access_token: config.access_token,
            range: config.range,
            schema: config.schema,
            order_locks: KeyedLocks::new(),
        })
    }

    fn values_url(&self, suffix: &str) -> Url {
        let segment = format!("{}{suffix}", self.range);
        http::endpoint(&self.values_base, &[segment.as_str()])
    }

    async fn rows(&self) -> std::result::Result<Vec<Vec<String>>, LedgerError> {
        let response = self
            .client
            .get(self.values_url(""))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?;

        if !response.status().is_success() {
            let (status, body) = http::failure(response).await;
            tracing::warn!(status, %body, "ledger read failed");
            return Err(LedgerError::Read(format!("HTTP {status}")));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| LedgerError::Read(format!("undecodable value range: {e}")))?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

#[async_trait]
impl LedgerClient for SheetsLedger {
    #[tracing::instrument(skip(self, record), fields(order_id = %record.order_id))]
    async fn append(&self, record: &OrderRecord) -> std::result::Result<(), LedgerError> {
        let body = AppendBody {
            values: vec![self.schema.to_row(record)],
        };
        let response = self
            .client
            .post(self.values_url(":append"))
            // RAW keeps customer text such as "+81..." or "=..." as typed.
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Write(e.to_string()))?;

        if !response.status().is_success() {
            let (status, body) = http::failure(response).await;
            tracing::warn!(status, %body, "ledger append failed");
            return Err(LedgerError::Write(format!("HTTP {status}")));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_order_id(
        &self,
        id: &OrderId,
    ) -> std::result::Result<Option<OrderRecord>, LedgerError> {
        let rows = self.rows().await?;
        let Some(row) = rows
            .iter()
            .find(|row| self.schema.order_id_of(row) == Some(id.as_str()))
        else {
            return Ok(None);
        };
        Ok(Some(self.schema.from_row(row)?))
    }

    async fn append_once(
        &self,
        record: &OrderRecord,
    ) -> std::result::Result<AppendOutcome, LedgerError> {
        let _guard = self.order_locks.lock(record.order_id.as_str()).await;
        append_if_absent(self, record).await
    }
}

#[derive(Debug, Serialize)]
struct AppendBody {
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Renders a cell the way the sheet displays it.
fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Value::from("pi_1")), "pi_1");
        assert_eq!(cell_text(&Value::from(2000)), "2000");
        assert_eq!(cell_text(&Value::Bool(true)), "TRUE");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn test_values_url() {
        let ledger = SheetsLedger::new(SheetsConfig {
            api_base: "https://sheets.example.com".to_string(),
            spreadsheet_id: "sheet-1".to_string(),
            access_token: "token".to_string(),
            range: "Orders!A:O".to_string(),
            schema: LedgerSchema::V1,
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        assert_eq!(
            ledger.values_url(":append").as_str(),
            "https://sheets.example.com/v4/spreadsheets/sheet-1/values/Orders!A:O:append"
        );
    }
}
