//! Infrastructure implementation of the `ProviderClient` port for the
//! DigitalOcean v2 API.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use gantry_common::{Owner, Server};
use serde::Deserialize;

use crate::application::ports::{ProviderClient, Remote};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(16);

/// Calls the provider API with the owner's own token.
pub struct DigitalOceanClient {
    http: reqwest::Client,
    api_url: String,
}

impl DigitalOceanClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("gantry/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, owner: &Owner, path: &str) -> Result<T> {
        let Some(token) = owner.provider_token.as_deref() else {
            bail!("owner {} has no Digital Ocean API token", owner.id);
        };
        let url = format!("{}{path}", self.api_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let body: ApiError = response.json().await.unwrap_or_default();
            bail!("GET {url} returned {status}: {}", body.message);
        }
        response
            .json()
            .await
            .with_context(|| format!("decoding response from {url}"))
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct DropletEnvelope {
    droplet: Droplet,
}

#[derive(Debug, Deserialize)]
struct Droplet {
    id: u64,
    #[serde(default)]
    networks: Networks,
}

#[derive(Debug, Default, Deserialize)]
struct Networks {
    #[serde(default)]
    v4: Vec<NetworkV4>,
}

#[derive(Debug, Deserialize)]
struct NetworkV4 {
    ip_address: IpAddr,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct KeyEnvelope {
    ssh_key: SshKey,
}

#[derive(Debug, Deserialize)]
struct SshKey {
    public_key: String,
}

impl Droplet {
    fn public_ip(&self) -> Option<IpAddr> {
        self.networks
            .v4
            .iter()
            .find(|n| n.kind == "public")
            .map(|n| n.ip_address)
    }

    fn into_remote(self) -> Remote {
        Remote {
            ip_address: self.public_ip(),
            id: Some(self.id),
            error: None,
        }
    }
}

impl ProviderClient for DigitalOceanClient {
    async fn remote(&self, owner: &Owner, server: &Server) -> Remote {
        let Some(id) = server.remote_id else {
            return Remote::missing();
        };
        match self
            .get::<DropletEnvelope>(owner, &format!("/v2/droplets/{id}"))
            .await
        {
            Ok(envelope) => envelope.droplet.into_remote(),
            Err(err) => {
                tracing::warn!(server_id = %server.id, remote_id = id, error = %err, "droplet lookup failed");
                Remote::failed(id, format!("{err:#}"))
            }
        }
    }

    async fn public_key(&self, owner: &Owner, key_id: &str) -> Result<String> {
        let envelope: KeyEnvelope = self
            .get(owner, &format!("/v2/account/keys/{key_id}"))
            .await?;
        Ok(envelope.ssh_key.public_key)
    }
}
