//! Paginated collection fetcher
//!
//! Returns the complete, ordered result set of one query by following the
//! server's continuation links page by page. Errors propagate unchanged; the
//! caller owns the retry policy.

use super::envelope::{Envelope, Page};
use super::filter::Query;
use crate::error::FetchError;
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Basic-auth credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// OData collection reader
#[derive(Clone, Debug)]
pub struct PagedFetcher {
    http_client: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl PagedFetcher {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        // Url::join drops the last segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url =
            Url::parse(&normalized).map_err(|_| FetchError::InvalidUrl(base_url.to_string()))?;

        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network {
                url: base_url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url,
            credentials,
        })
    }

    /// Fetch every record of `collection` matching `query`
    ///
    /// Pages are requested strictly in continuation order and concatenated.
    pub async fn fetch_all<T>(&self, collection: &str, query: &Query) -> Result<Vec<T>, FetchError>
    where
        T: DeserializeOwned,
    {
        let mut url = self
            .base_url
            .join(collection.trim_start_matches('/'))
            .map_err(|_| FetchError::InvalidUrl(collection.to_string()))?;
        url.query_pairs_mut().extend_pairs(query.params());

        let mut records = Vec::new();
        let mut page_number = 0usize;

        loop {
            page_number += 1;
            let page: Page<T> = self.fetch_page(&url).await?;

            tracing::debug!(
                collection,
                page = page_number,
                records = page.items.len(),
                has_next = page.next.is_some(),
                "Fetched page"
            );
            records.extend(page.items);

            let Some(next) = page.next else {
                break;
            };

            // Relative links resolve against the service root
            let next_url = self
                .base_url
                .join(next.trim_start_matches('/'))
                .map_err(|_| FetchError::InvalidUrl(next.clone()))?;
            if next_url == url {
                return Err(FetchError::Parse {
                    url: url.to_string(),
                    message: "continuation link points at the current page".to_string(),
                });
            }
            url = next_url;
        }

        Ok(records)
    }

    async fn fetch_page<T>(&self, url: &Url) -> Result<Page<T>, FetchError>
    where
        T: DeserializeOwned,
    {
        let url_text = url.as_str();

        let response = self
            .http_client
            .get(url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url_text, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                url: url_text.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url_text, e))?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|e| FetchError::Parse {
                url: url_text.to_string(),
                message: e.to_string(),
            })?;

        envelope.into_page().ok_or_else(|| FetchError::Parse {
            url: url_text.to_string(),
            message: "response matches neither the next-link nor the cursor envelope".to_string(),
        })
    }
}
