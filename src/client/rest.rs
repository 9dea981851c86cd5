use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{BasicAuth, RestGateway};

impl BasicAuth {
    /// Authorization header value for these credentials.
    pub fn header_value(&self) -> String {
        let user_info = format!("{}:{}", self.username, self.api_key);
        format!("Basic {}", STANDARD.encode(user_info.as_bytes()))
    }
}

/// Blocking HTTP gateway.
///
/// Uses the HTTP client's default timeout behavior; the retry policy lives
/// with the caller, not here.
pub struct HttpGateway {
    client: reqwest::blocking::Client,
}

impl HttpGateway {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpGateway { client })
    }
}

impl RestGateway for HttpGateway {
    fn get(&self, url: &str, auth: &Option<BasicAuth>) -> Result<String> {
        let mut request = self.client.get(url);
        if let Some(auth) = auth {
            request = request.header(reqwest::header::AUTHORIZATION, auth.header_value());
        }
        let response = request
            .send()
            .context(format!("Error with REST url: {}", url))?
            .error_for_status()
            .context(format!("Error status from REST url: {}", url))?;
        response.text().context("Failed to read response body")
    }

    fn post_query(&self, url: &str, body: &str, auth: &Option<BasicAuth>) -> Result<String> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body.to_string());
        if let Some(auth) = auth {
            request = request.header(reqwest::header::AUTHORIZATION, auth.header_value());
        }
        let response = request
            .send()
            .context(format!("Error with REST url: {}", url))?
            .error_for_status()
            .context(format!("Error status from REST url: {}", url))?;
        response.text().context("Failed to read response body")
    }
}
