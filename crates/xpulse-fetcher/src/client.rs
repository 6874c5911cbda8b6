//! HTTP client for the third-party content API.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;
use xpulse_core::{AppConfig, FetchedItem, DEFAULT_API_BASE_URL};

use crate::error::FetchError;
use crate::rate_limit::retry_with_backoff;
use crate::types::{items_from_values, RawLookup, RawSearchPage, SearchPage};

/// Client for the advanced-search and post-lookup endpoints.
///
/// Every request carries the bearer credential. 429, network failures, and
/// 5xx responses are retried with exponential back-off up to `max_retries`
/// additional attempts; other 4xx responses and malformed bodies are not.
pub struct ContentApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    backoff_base_ms: u64,
    page_delay: Duration,
}

impl ContentApiClient {
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_API_BASE_URL.to_owned(),
            api_key: api_key.to_owned(),
            max_retries,
            backoff_base_ms,
            page_delay: Duration::ZERO,
        })
    }

    /// Builds a client from application config.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::MissingApiKey`] when no key is configured, or
    /// any error from [`Self::new`] / [`Self::with_base_url`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, FetchError> {
        let api_key = config.api_key.as_deref().ok_or(FetchError::MissingApiKey)?;
        Ok(Self::new(
            api_key,
            config.request_timeout_secs,
            &config.user_agent,
            config.max_retries,
            config.retry_backoff_base_ms,
        )?
        .with_base_url(&config.api_base_url)?
        .with_page_delay(Duration::from_millis(config.page_delay_ms)))
    }

    /// Points the client at another base URL, e.g. a local mock server.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidBaseUrl`] unless `base_url` is an
    /// absolute http(s) URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, FetchError> {
        let parsed =
            Url::parse(base_url).map_err(|_| FetchError::InvalidBaseUrl(base_url.to_owned()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidBaseUrl(base_url.to_owned()));
        }
        base_url.trim_end_matches('/').clone_into(&mut self.base_url);
        Ok(self)
    }

    /// Pause between consecutive pages of one subject.
    #[must_use]
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    #[must_use]
    pub fn page_delay(&self) -> Duration {
        self.page_delay
    }

    /// Fetches one page of advanced-search results.
    ///
    /// # Errors
    ///
    /// - [`FetchError::RateLimited`]: HTTP 429 after all retries.
    /// - [`FetchError::Unauthorized`]: HTTP 401/403 (not retried).
    /// - [`FetchError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`FetchError::Http`]: network failure after all retries.
    /// - [`FetchError::Deserialize`]: malformed body (not retried).
    pub async fn search_page(
        &self,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<SearchPage, FetchError> {
        let url = format!("{}/tweet/advanced_search", self.base_url);
        let mut params: Vec<(&str, &str)> = vec![("query", query), ("queryType", "Latest")];
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            params.push(("cursor", cursor));
        }

        let body = self.get_json(&url, &params).await?;
        let raw: RawSearchPage =
            serde_json::from_str(&body).map_err(|source| FetchError::Deserialize {
                context: format!("search page for '{query}'"),
                source,
            })?;

        let items = items_from_values(raw.items, "search result");
        Ok(SearchPage {
            items,
            has_next_page: raw.has_next_page,
            next_cursor: raw.next_cursor.filter(|c| !c.is_empty()),
        })
    }

    /// Looks up posts by id in a single request.
    ///
    /// # Errors
    ///
    /// Same as [`Self::search_page`].
    pub async fn lookup_posts(&self, ids: &[String]) -> Result<Vec<FetchedItem>, FetchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/tweets", self.base_url);
        let joined = ids.join(",");
        let body = self.get_json(&url, &[("tweet_ids", joined.as_str())]).await?;
        let raw: RawLookup =
            serde_json::from_str(&body).map_err(|source| FetchError::Deserialize {
                context: format!("lookup of {} post(s)", ids.len()),
                source,
            })?;
        Ok(items_from_values(raw.into_values(), "looked-up post"))
    }

    /// GETs `url` with retry and returns the body of a 2xx response.
    async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async move {
            let response = self
                .client
                .get(url)
                .bearer_auth(&self.api_key)
                .header(reqwest::header::ACCEPT, "application/json")
                .query(params)
                .send()
                .await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(FetchError::RateLimited { retry_after_secs });
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(FetchError::Unauthorized {
                    status: status.as_u16(),
                });
            }

            if !status.is_success() {
                return Err(FetchError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_owned(),
                });
            }

            Ok(response.text().await?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ContentApiClient {
        ContentApiClient::new("key", 5, "xpulse-test/0.1", 0, 0).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = client().with_base_url("http://127.0.0.1:9/api/").unwrap();
        assert_eq!(c.base_url, "http://127.0.0.1:9/api");
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        assert!(matches!(
            client().with_base_url("ftp://example.com"),
            Err(FetchError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            client().with_base_url("not a url"),
            Err(FetchError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn default_page_delay_is_zero() {
        assert_eq!(client().page_delay(), Duration::ZERO);
    }
}
