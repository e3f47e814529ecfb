pub mod models;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;

use self::models::{TokenResponse, User, ZoneState};

const AUTH_URL: &str = "https://auth.tado.com/oauth/token";
const API_BASE: &str = "https://my.tado.com/api/v2";

/// Public client id/secret pair Tado hands out for API preview access.
/// Not an account secret, but the live service must still accept exactly
/// these values — verify before deploying.
const CLIENT_ID: &str = "public-api-preview";
const CLIENT_SECRET: &str = "4HJGRffVR8xb3XdEUQpjgZ1VplJi6Xgw";

const OAUTH_SCOPE: &str = "home.user";

/// Zone whose sensor state is read. Single-zone homes expose their
/// thermostat as zone 1.
const ZONE: u32 = 1;

/// Read access to a relative-humidity measurement.
#[async_trait]
pub trait HumiditySensor {
    /// Current relative humidity in percent, read fresh on every call.
    async fn humidity(&self) -> Result<f64>;
}

#[derive(Debug, Clone)]
pub struct TadoClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    username: String,
    password: String,
    /// Bearer token, fetched lazily on first use. One process is one run,
    /// so there is no expiry or refresh handling.
    token: Mutex<Option<String>>,
}

impl TadoClient {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: Client::new(),
                username: config.tado_username.clone(),
                password: config.tado_password.clone(),
                token: Mutex::new(None),
            }),
        }
    }

    /// Returns the bearer token, authenticating on first use.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.inner.token.lock().await;

        if let Some(ref token) = *guard {
            return Ok(token.clone());
        }

        info!("Authenticating to Tado");
        let token = self.fetch_token().await?;
        *guard = Some(token.clone());

        Ok(token)
    }

    async fn fetch_token(&self) -> Result<String> {
        let params = [
            ("username", self.inner.username.as_str()),
            ("password", self.inner.password.as_str()),
            ("scope", OAUTH_SCOPE),
            ("grant_type", "password"),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
        ];

        let resp = self
            .inner
            .http
            .post(AUTH_URL)
            .form(&params)
            .send()
            .await
            .context("Tado token request failed")?
            .error_for_status()
            .context("Tado token endpoint returned error status")?
            .json::<TokenResponse>()
            .await
            .context("Failed to deserialize Tado token response")?;

        Ok(resp.access_token)
    }

    /// Resolve the account's home id via `/me`. Exactly one home is
    /// expected; the first entry is used.
    async fn home_id(&self, token: &str) -> Result<i64> {
        let url = format!("{API_BASE}/me");
        debug!(url = %url, "Resolving Tado home id");

        let me = self
            .inner
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Tado /me request failed")?
            .error_for_status()
            .context("Tado /me endpoint returned error status")?
            .json::<User>()
            .await
            .context("Failed to deserialize Tado /me response")?;

        let home = me.homes.first().context("Tado account has no homes")?;
        Ok(home.id)
    }
}

#[async_trait]
impl HumiditySensor for TadoClient {
    async fn humidity(&self) -> Result<f64> {
        let token = self.access_token().await?;
        let home_id = self.home_id(&token).await?;

        let url = format!("{API_BASE}/homes/{home_id}/zones/{ZONE}/state");
        debug!(url = %url, "Fetching zone state");

        let state = self
            .inner
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .context("Tado zone state request failed")?
            .error_for_status()
            .context("Tado zone state endpoint returned error status")?
            .json::<ZoneState>()
            .await
            .context("Failed to deserialize Tado zone state response")?;

        let humidity = state
            .sensor_data_points
            .humidity
            .context("zone state carried no humidity data point")?
            .percentage;

        info!(humidity = %humidity, "Humidity reading");
        Ok(humidity)
    }
}
