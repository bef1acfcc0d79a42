//! HTTP client for the catalog search service.
//!
//! The service answers `POST {base}/query` with a JSON array of item records.
//! Records are loosely typed on the wire (ids may be numbers or strings,
//! prices may arrive as floats), so each one is validated before use.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::catalog::CatalogItem;
use crate::domain::errors::CatalogError;
use crate::domain::ports::CatalogClient;

const CATALOG_MODEL: &str = "items";
const CATALOG_FIELDS: [&str; 5] = ["id", "name", "category", "price_ugx", "available"];

#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

pub struct HttpCatalogClient {
    client: reqwest::Client,
    query_url: String,
}

impl HttpCatalogClient {
    pub fn new(config: CatalogClientConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Http(e.to_string()))?;
        Ok(Self {
            client,
            query_url: format!("{}/query", config.base_url.trim_end_matches('/')),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    model: &'a str,
    fields: &'a [&'a str],
    query_text: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct RawCatalogItem {
    id: Option<Value>,
    name: Option<String>,
    category: Option<String>,
    price: Option<serde_json::Number>,
    price_ugx: Option<serde_json::Number>,
    available: Option<bool>,
}

impl TryFrom<RawCatalogItem> for CatalogItem {
    type Error = CatalogError;

    fn try_from(raw: RawCatalogItem) -> Result<Self, Self::Error> {
        let id = match raw.id {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(|i| i.to_string())
                .unwrap_or_else(|| n.to_string()),
            Some(Value::String(s)) if !s.is_empty() => s,
            other => {
                return Err(CatalogError::Payload(format!(
                    "item id must be a number or string, got {:?}",
                    other
                )))
            }
        };
        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| CatalogError::Payload(format!("item {} has no name", id)))?;
        // The field the query asks for wins over the generic one.
        let price = raw
            .price_ugx
            .or(raw.price)
            .and_then(|p| p.as_i64().or_else(|| p.as_f64().map(|f| f.trunc() as i64)))
            .filter(|p| *p >= 0)
            .ok_or_else(|| CatalogError::Payload(format!("item {} has no valid price", id)))?;

        Ok(CatalogItem {
            id,
            name,
            category: raw.category,
            price,
            available: raw.available.unwrap_or(false),
        })
    }
}

/// Decodes at most `max_results` records. Records past the limit are dropped
/// unread, so a malformed tail never fails the lookup.
pub(crate) fn parse_items(body: &str, max_results: usize) -> Result<Vec<CatalogItem>, CatalogError> {
    let mut records: Vec<Value> =
        serde_json::from_str(body).map_err(|e| CatalogError::Payload(e.to_string()))?;
    records.truncate(max_results);
    records
        .into_iter()
        .map(|record| {
            let raw: RawCatalogItem = serde_json::from_value(record)
                .map_err(|e| CatalogError::Payload(e.to_string()))?;
            CatalogItem::try_from(raw)
        })
        .collect()
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn query(&self, text: &str, max_results: u32) -> Result<Vec<CatalogItem>, CatalogError> {
        let body = QueryRequest {
            model: CATALOG_MODEL,
            fields: &CATALOG_FIELDS,
            query_text: text,
            max_results,
        };

        let response = self
            .client
            .post(&self.query_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CatalogError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Response(format!("HTTP {}: {}", status, text)));
        }

        let payload = response
            .text()
            .await
            .map_err(|e| CatalogError::Http(e.to_string()))?;
        let items = parse_items(&payload, max_results as usize)?;
        log::debug!("catalog query {:?} returned {} item(s)", text, items.len());
        Ok(items)
    }
}
