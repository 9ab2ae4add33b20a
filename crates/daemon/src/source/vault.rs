use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::{SecretSource, Secrets, ServiceSecrets, SourceError};

/// Environment variable consulted for the Connect token unless configured otherwise
pub const DEFAULT_TOKEN_ENV: &str = "OP_CONNECT_TOKEN";

/// Reads every item of one vault through a 1Password Connect server.
///
/// Each item is a service (its title is the identity name) and each field
/// with a value is a secret, keyed by the field label.
#[derive(Debug, Clone)]
pub struct VaultSource {
    remote: Url,
    vault: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct VaultSummary {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ItemSummary {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: String,
    #[serde(default)]
    fields: Vec<Field>,
}

#[derive(Debug, Deserialize)]
struct Field {
    id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl VaultSource {
    pub fn new(mut remote: Url, vault: String, token: String) -> Result<Self, SourceError> {
        // API paths are joined relative to the base, so it must end in a slash
        if !remote.path().ends_with('/') {
            let path = format!("{}/", remote.path());
            remote.set_path(&path);
        }

        let mut default_headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| SourceError::InvalidToken)?;
        bearer.set_sensitive(true);
        default_headers.insert(AUTHORIZATION, bearer);
        let client = Client::builder().default_headers(default_headers).build()?;

        Ok(Self {
            remote,
            vault,
            client,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let url = self.remote.join(path)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn vault_id(&self) -> Result<String, SourceError> {
        let vaults: Vec<VaultSummary> = self.get("v1/vaults").await?;
        vaults
            .into_iter()
            .find(|v| v.name == self.vault)
            .map(|v| v.id)
            .ok_or_else(|| SourceError::VaultNotFound(self.vault.clone()))
    }
}

#[async_trait::async_trait]
impl SecretSource for VaultSource {
    async fn load(&self) -> Result<Secrets, SourceError> {
        let vault_id = self.vault_id().await?;
        let items: Vec<ItemSummary> = self.get(&format!("v1/vaults/{}/items", vault_id)).await?;
        if items.is_empty() {
            return Err(SourceError::EmptyVault(self.vault.clone()));
        }

        let mut secrets = Secrets::new();
        for summary in items {
            let item: Item = self
                .get(&format!("v1/vaults/{}/items/{}", vault_id, summary.id))
                .await?;

            let fields: ServiceSecrets = item
                .fields
                .into_iter()
                .filter_map(|field| {
                    let value = field.value?;
                    let name = field.label.filter(|l| !l.is_empty()).unwrap_or(field.id);
                    Some((name, value))
                })
                .collect();

            tracing::debug!(service = %item.title, secrets = fields.len(), "loaded vault item");
            secrets.insert(item.title, fields);
        }
        Ok(secrets)
    }
}
