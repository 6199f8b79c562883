/// PostgREST customer backend
///
/// Talks to `{base_url}/rest/v1/customers` with the service key sent both as
/// `apikey` and as a bearer token. Unavailable responses (transport errors,
/// 5xx, 429) are retried with a linear backoff; client errors are returned
/// at once.
///
/// # Example
///
/// ```no_run
/// use bizacc_shared::customers::{CustomerBackend, RestConfig, RestCustomerBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = RestCustomerBackend::new(RestConfig::new("https://db.example.in", "service-key"))?;
/// let customers = backend.list().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{CustomerBackend, CustomerError};
use crate::models::customer::Customer;

#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,

    /// Sent as `apikey` and `Authorization: Bearer`
    pub api_key: String,

    pub timeout: Duration,

    /// Total attempts per request, first one included
    pub max_attempts: u32,

    /// Delay before attempt `n + 1` is `n * base_backoff`
    pub base_backoff: Duration,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
        }
    }
}

pub struct RestCustomerBackend {
    client: Client,
    config: RestConfig,
}

impl RestCustomerBackend {
    pub fn new(config: RestConfig) -> Result<Self, CustomerError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| CustomerError::Transport(format!("invalid api key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| CustomerError::Transport(format!("invalid api key: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| CustomerError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/customers", self.config.base_url.trim_end_matches('/'))
    }

    /// Sends the request built by `build`, retrying while the service is
    /// unavailable
    async fn send_with_retry<T, F>(&self, build: F) -> Result<T, CustomerError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.send_once(build()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_unavailable() && attempt < attempts => e,
                Err(e) => return Err(e),
            };

            debug!(attempt, error = %err, "Customer service unavailable, retrying");
            tokio::time::sleep(self.config.base_backoff.saturating_mul(attempt)).await;
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CustomerError> {
        let response = request
            .send()
            .await
            .map_err(|e| CustomerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CustomerError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CustomerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CustomerBackend for RestCustomerBackend {
    #[instrument(name = "customers_rest_insert", skip_all, fields(id = %customer.id))]
    async fn insert(&self, customer: &Customer) -> Result<Customer, CustomerError> {
        let url = self.table_url();
        let rows: Vec<Customer> = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .header("Prefer", "return=representation")
                    .json(customer)
            })
            .await?;

        rows.into_iter().next().ok_or_else(|| {
            warn!(id = %customer.id, "Insert returned no rows");
            CustomerError::Decode("insert returned no rows".into())
        })
    }

    #[instrument(name = "customers_rest_list", skip_all)]
    async fn list(&self) -> Result<Vec<Customer>, CustomerError> {
        let url = self.table_url();
        self.send_with_retry(|| {
            self.client
                .get(&url)
                .query(&[("select", "*"), ("order", "created_at.desc")])
        })
        .await
    }

    #[instrument(name = "customers_rest_update", skip_all, fields(id = %id))]
    async fn update(&self, id: &str, customer: &Customer) -> Result<Customer, CustomerError> {
        let url = self.table_url();
        let filter = format!("eq.{id}");
        let rows: Vec<Customer> = self
            .send_with_retry(|| {
                self.client
                    .patch(&url)
                    .query(&[("id", filter.as_str())])
                    .header("Prefer", "return=representation")
                    .json(customer)
            })
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| CustomerError::NotFound(id.to_string()))
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
