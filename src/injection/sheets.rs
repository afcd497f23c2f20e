use crate::error::{Result, SoaLedgerError};
use crate::grid::CellValue;
use crate::injection::target::{classify_failure, RangeUpdate, SheetTarget};
use crate::utils::spreadsheet_id_from_url;
use log::debug;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::json;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub access_token: String,
    pub base_url: String,
}

impl SheetsConfig {
    pub fn new(spreadsheet_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
            base_url: SHEETS_BASE_URL.to_string(),
        }
    }

    /// Accepts either a bare spreadsheet id or a share URL. The bearer token comes from
    /// `SHEETS_ACCESS_TOKEN`, the API root optionally from `SHEETS_BASE_URL`.
    pub fn from_env(spreadsheet: &str) -> Result<Self> {
        let spreadsheet_id =
            spreadsheet_id_from_url(spreadsheet).unwrap_or_else(|| spreadsheet.trim().to_string());
        if spreadsheet_id.is_empty() {
            return Err(SoaLedgerError::Config("spreadsheet id is empty".into()));
        }

        let access_token = std::env::var("SHEETS_ACCESS_TOKEN")
            .map_err(|_| SoaLedgerError::Config("SHEETS_ACCESS_TOKEN is not set".into()))?;

        let mut config = Self::new(spreadsheet_id, access_token);
        if let Ok(base_url) = std::env::var("SHEETS_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn cell_from_json(value: serde_json::Value) -> CellValue {
    match value {
        serde_json::Value::String(s) => CellValue::from(s.as_str()),
        serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
        serde_json::Value::Bool(b) => CellValue::Bool(b),
        _ => CellValue::Empty,
    }
}

/// Sheets v4 REST destination.
#[derive(Clone)]
pub struct GoogleSheetsTarget {
    client: Client,
    config: SheetsConfig,
}

impl GoogleSheetsTarget {
    pub fn new(config: SheetsConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &SheetsConfig {
        &self.config
    }

    fn values_url(&self, range: &str) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/spreadsheets/{}/values",
            self.config.base_url, self.config.spreadsheet_id
        ))
        .map_err(|e| SoaLedgerError::Config(format!("invalid Sheets base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SoaLedgerError::Config("Sheets base URL cannot take a path".into()))?
            .push(range);
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(
            Some(status.as_u16()),
            format!("Sheets API returned {}: {}", status, body),
        ))
    }
}

impl SheetTarget for GoogleSheetsTarget {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<CellValue>>> {
        let url = self.values_url(range)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let values: ValueRange = Self::check(response).await?.json().await?;

        Ok(values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_from_json).collect())
            .collect())
    }

    async fn write_range(&self, update: RangeUpdate) -> Result<()> {
        self.batch_write(vec![update]).await
    }

    async fn batch_write(&self, updates: Vec<RangeUpdate>) -> Result<()> {
        let url = format!(
            "{}/spreadsheets/{}/values:batchUpdate",
            self.config.base_url, self.config.spreadsheet_id
        );
        debug!("POST {} ({} range(s))", url, updates.len());
        let body = json!({
            "valueInputOption": "USER_ENTERED",
            "data": updates,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_url_escapes_range() {
        let target = GoogleSheetsTarget::new(
            SheetsConfig::new("abc123", "token").with_base_url("https://example.test/v4/"),
        );
        let url = target.values_url("'Lots 2024'!A:A").unwrap();
        assert!(url
            .as_str()
            .starts_with("https://example.test/v4/spreadsheets/abc123/values/"));
        assert!(!url.as_str().contains(' '));
    }

    #[test]
    fn test_cells_from_json() {
        assert_eq!(cell_from_json(json!("12")), CellValue::Text("12".into()));
        assert_eq!(cell_from_json(json!(3.5)), CellValue::Number(3.5));
        assert_eq!(cell_from_json(json!("")), CellValue::Empty);
        assert_eq!(cell_from_json(json!(null)), CellValue::Empty);
    }
}
