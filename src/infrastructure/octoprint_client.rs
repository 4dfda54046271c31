// OctoPrint REST client implementing the printer host port
use crate::application::printer_host::PrinterHost;
use crate::domain::heater::PrinterProfile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct OctoPrintClient {
    host: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ProfilesResponse {
    #[serde(default)]
    profiles: HashMap<String, ProfileEntry>,
}

#[derive(Debug, Deserialize)]
struct ProfileEntry {
    #[serde(default)]
    current: bool,
    #[serde(default)]
    default: bool,
    #[serde(flatten)]
    profile: PrinterProfile,
}

#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    commands: &'a [String],
}

impl OctoPrintClient {
    pub fn new(host: String, api_key: String) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

/// The profile flagged current, else the default one.
fn select_profile(response: ProfilesResponse) -> Option<PrinterProfile> {
    let mut entries: Vec<ProfileEntry> = response.profiles.into_values().collect();
    let index = entries
        .iter()
        .position(|p| p.current)
        .or_else(|| entries.iter().position(|p| p.default))?;
    Some(entries.swap_remove(index).profile)
}

#[async_trait]
impl PrinterHost for OctoPrintClient {
    async fn current_profile(&self) -> Result<Option<PrinterProfile>> {
        let response = self
            .client
            .get(self.url("/api/printerprofiles"))
            .header("X-Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to OctoPrint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OctoPrint profile query failed with status {}: {}", status, body);
        }

        let profiles = response
            .json::<ProfilesResponse>()
            .await
            .context("Failed to parse OctoPrint printer profiles")?;

        Ok(select_profile(profiles))
    }

    async fn send_commands(&self, commands: &[String]) -> Result<()> {
        tracing::info!("Sending commands {:?}", commands);
        let response = self
            .client
            .post(self.url("/api/printer/command"))
            .header("X-Api-Key", &self.api_key)
            .json(&CommandRequest { commands })
            .send()
            .await
            .context("Failed to send command to OctoPrint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OctoPrint rejected commands with status {}: {}", status, body);
        }

        Ok(())
    }
}
