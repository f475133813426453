use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::time::Duration;

use crate::error::Result;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Client for the listings database (Supabase's PostgREST interface).
///
/// Constructed once at worker startup and shared by every call. Unset
/// credentials are accepted; requests made with them are rejected by the
/// server, not here.
#[derive(Clone, Debug)]
pub struct DatabaseClient {
    client: Client,
    base_url: String,
}

impl DatabaseClient {
    /// Build a client authenticated with the service-role key.
    ///
    /// # Errors
    /// Returns an error if the key is not a valid header value or the HTTP
    /// client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new(base_url: &str, service_role_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(service_role_key)?;
        api_key.set_sensitive(true);
        let mut auth = HeaderValue::from_str(&format!("Bearer {service_role_key}"))?;
        auth.set_sensitive(true);
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(DEFAULT_TIMEOUT)
            .pool_idle_timeout(DEFAULT_POOL_IDLE_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Whether a project URL was configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    /// PostgREST URL of `table`.
    #[must_use]
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    #[must_use]
    pub const fn http(&self) -> &Client {
        &self.client
    }
}
