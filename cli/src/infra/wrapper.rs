//! Infrastructure implementation of the `ApplicationControl` port: the
//! wrapper's HTTP management endpoint on the provisioned server.

use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::application::ports::{ApplicationControl, WrapperEndpoint};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

pub struct WrapperClient {
    http: reqwest::Client,
}

impl WrapperClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self { http })
    }
}

fn start_url(endpoint: &WrapperEndpoint) -> String {
    let host = match endpoint.host {
        std::net::IpAddr::V4(v4) => v4.to_string(),
        std::net::IpAddr::V6(v6) => format!("[{v6}]"),
    };
    format!("http://{host}:{}/start", endpoint.port)
}

impl ApplicationControl for WrapperClient {
    async fn start(&self, endpoint: &WrapperEndpoint) -> Result<()> {
        let url = start_url(endpoint);
        let response = self
            .http
            .post(&url)
            .basic_auth(&endpoint.username, Some(&endpoint.password))
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("POST {url} returned {status}: {}", body.trim());
        }
        Ok(())
    }
}
