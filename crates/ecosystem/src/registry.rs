use nxui_core::{WidgetError, WidgetResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/nxui/registry/main/registry.json";

/// One installable widget advertised by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub id: String,
    pub name: String,
    pub author: String,
    pub version: String,
    pub description: String,
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    widgets: Vec<RegistryEntry>,
}

fn mock_entry(
    id: &str,
    name: &str,
    author: &str,
    version: &str,
    description: &str,
    tags: [&str; 2],
) -> RegistryEntry {
    RegistryEntry {
        id: id.to_string(),
        name: name.to_string(),
        author: author.to_string(),
        version: version.to_string(),
        description: description.to_string(),
        download_url: crate::installer::MOCK_DOWNLOAD.to_string(),
        preview_url: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Listing served when the remote registry cannot be reached.
pub fn builtin_registry() -> Vec<RegistryEntry> {
    vec![
        mock_entry(
            "calc-pro",
            "Calculator Pro",
            "NxUI Community",
            "1.0.0",
            "A sleek glassmorphism calculator with history.",
            ["Utility", "Productivity"],
        ),
        mock_entry(
            "crypto-ticker",
            "Crypto Ticker",
            "Satoshi",
            "1.2.0",
            "Live cryptocurrency prices on your desktop.",
            ["Finance", "Live Data"],
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    url: String,
}

impl RegistryClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> WidgetResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WidgetError::Install(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    async fn fetch_remote(&self) -> Result<Vec<RegistryEntry>, reqwest::Error> {
        let document: RegistryDocument = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(document.widgets)
    }

    /// Remote listing, or the built-in one on any failure.
    pub async fn fetch(&self) -> Vec<RegistryEntry> {
        match self.fetch_remote().await {
            Ok(widgets) => {
                tracing::debug!("Fetched {} registry entries from {}", widgets.len(), self.url);
                widgets
            }
            Err(e) => {
                tracing::warn!("Failed to fetch remote registry ({}); using built-in listing", e);
                builtin_registry()
            }
        }
    }

    pub async fn find(&self, id: &str) -> Option<RegistryEntry> {
        self.fetch().await.into_iter().find(|entry| entry.id == id)
    }
}
