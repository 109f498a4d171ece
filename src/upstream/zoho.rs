//! Zoho Inventory client.
//!
//! Read-only access to the item listing and item detail endpoints of the
//! Zoho Inventory v1 API. See: <https://www.zoho.com/inventory/api/v1/items/>

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::auth::TokenSource;
use super::traits::{InventorySource, ItemDetail, ItemFilter, ItemPage, ListedItem};
use crate::{Result, StockroomError};

/// Items per listing page (the API maximum).
pub const PAGE_SIZE: u32 = 200;

/// Per-request timeout used by [`ZohoInventoryClient::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Data-centre suffix → API host.
const API_HOSTS: &[(&str, &str)] = &[
    (".com", "https://www.zohoapis.com"),
    (".eu", "https://www.zohoapis.eu"),
    (".in", "https://www.zohoapis.in"),
    (".com.au", "https://www.zohoapis.com.au"),
    (".ca", "https://www.zohoapis.ca"),
    (".jp", "https://www.zohoapis.jp"),
    (".sa", "https://www.zohoapis.sa"),
];

/// API host for a data-centre domain suffix such as `".eu"`.
///
/// Unknown suffixes are appended to `https://www.zohoapis`.
pub fn api_host(domain: &str) -> String {
    API_HOSTS
        .iter()
        .find(|(suffix, _)| *suffix == domain)
        .map(|(_, host)| host.to_string())
        .unwrap_or_else(|| format!("https://www.zohoapis{domain}"))
}

/// Accounts (OAuth) host for a data-centre domain suffix.
pub fn accounts_host(domain: &str) -> String {
    format!("https://accounts.zoho{domain}")
}

/// Client for the Zoho Inventory item endpoints.
#[derive(Clone)]
pub struct ZohoInventoryClient {
    http: Client,
    base_url: String,
    organization_id: String,
    tokens: Arc<dyn TokenSource>,
}

impl ZohoInventoryClient {
    /// Create a client for a data-centre domain (e.g. `".com"`).
    pub fn new(
        domain: &str,
        organization_id: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self> {
        Self::with_base_url(
            format!("{}/inventory/v1", api_host(domain)),
            organization_id,
            tokens,
            DEFAULT_TIMEOUT,
        )
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(
        base_url: impl Into<String>,
        organization_id: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                StockroomError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            organization_id: organization_id.into(),
            tokens,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        subject: &str,
    ) -> Result<T> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("Authorization", format!("Zoho-oauthtoken {token}"))
            .query(&[("organization_id", self.organization_id.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| StockroomError::Http(e.to_string()))?;

        handle_response_errors(&response, subject)?;

        response
            .json()
            .await
            .map_err(|e| StockroomError::Http(e.to_string()))
    }
}

/// Check response status and map to the appropriate error.
fn handle_response_errors(response: &reqwest::Response, subject: &str) -> Result<()> {
    let status = response.status();

    if status.is_success() {
        return Ok(());
    }

    match status.as_u16() {
        401 => Err(StockroomError::AuthenticationFailed),
        404 => Err(StockroomError::ItemNotFound(subject.to_string())),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(StockroomError::RateLimited { retry_after })
        }
        code => Err(StockroomError::Api {
            status: code,
            message: format!("Zoho Inventory error: {status}"),
        }),
    }
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListedItem>,
    #[serde(default)]
    page_context: Option<PageContext>,
}

#[derive(Deserialize)]
struct PageContext {
    #[serde(default)]
    has_more_page: bool,
}

#[derive(Deserialize)]
struct DetailResponse {
    #[serde(default)]
    item: Option<ItemDetail>,
}

#[async_trait]
impl InventorySource for ZohoInventoryClient {
    fn name(&self) -> &str {
        "zoho-inventory"
    }

    async fn list_page(&self, filter: &ItemFilter, page: u32) -> Result<ItemPage> {
        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", PAGE_SIZE.to_string()),
        ];
        if let Some(status) = &filter.status {
            query.push(("status", status.clone()));
        }

        let body: ListResponse = self.get("/items", &query, "items").await?;
        Ok(ItemPage {
            items: body.items,
            has_more: body.page_context.is_some_and(|ctx| ctx.has_more_page),
        })
    }

    async fn fetch_detail(&self, item_id: &str) -> Result<ItemDetail> {
        let body: DetailResponse = self
            .get(&format!("/items/{item_id}"), &[], item_id)
            .await?;
        Ok(body.item.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_domains_map_to_api_hosts() {
        assert_eq!(api_host(".com"), "https://www.zohoapis.com");
        assert_eq!(api_host(".com.au"), "https://www.zohoapis.com.au");
        assert_eq!(accounts_host(".eu"), "https://accounts.zoho.eu");
    }

    #[test]
    fn unknown_domain_is_appended() {
        assert_eq!(api_host(".uk"), "https://www.zohoapis.uk");
    }

    #[test]
    fn list_response_without_page_context() {
        let body: ListResponse =
            serde_json::from_str(r#"{"items": [{"item_id": "1", "name": "Merlot"}]}"#).unwrap();
        assert_eq!(body.items.len(), 1);
        assert!(body.page_context.is_none());
    }
}
