//! # OAuth Client-Credentials
//!
//! Monta o mapa de configuração OAuth usado para autenticar na conta de armazenamento
//! e troca as credenciais do service principal por um bearer token.

use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::errors::ApiError;
use crate::secrets::{Secret, ServicePrincipal};

pub const AUTH_TYPE_KEY: &str = "fs.azure.account.auth.type";
pub const PROVIDER_TYPE_KEY: &str = "fs.azure.account.oauth.provider.type";
pub const CLIENT_ID_KEY: &str = "fs.azure.account.oauth2.client.id";
pub const CLIENT_SECRET_KEY: &str = "fs.azure.account.oauth2.client.secret";
pub const CLIENT_ENDPOINT_KEY: &str = "fs.azure.account.oauth2.client.endpoint";

const CLIENT_CREDS_PROVIDER: &str =
    "org.apache.hadoop.fs.azurebfs.oauth2.ClientCredsTokenProvider";

/// Configuração OAuth de uma montagem.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: Secret,
    pub client_secret: Secret,
    /// Endpoint de token com o tenant já substituído.
    pub token_endpoint: String,
    pub resource: String,
}

impl OAuthConfig {
    /// `endpoint_template` deve conter `{tenant_id}`.
    pub fn new(principal: &ServicePrincipal, endpoint_template: &str, resource: &str) -> Self {
        Self {
            client_id: principal.client_id.clone(),
            client_secret: principal.client_secret.clone(),
            token_endpoint: endpoint_template.replace("{tenant_id}", principal.tenant_id.expose()),
            resource: resource.to_string(),
        }
    }

    /// Mapa chave/valor no formato das `extra_configs` de montagem.
    /// Contém o client secret em claro: não deve ir para log.
    pub fn extra_configs(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            (AUTH_TYPE_KEY, "OAuth".to_string()),
            (PROVIDER_TYPE_KEY, CLIENT_CREDS_PROVIDER.to_string()),
            (CLIENT_ID_KEY, self.client_id.expose().to_string()),
            (CLIENT_SECRET_KEY, self.client_secret.expose().to_string()),
            (CLIENT_ENDPOINT_KEY, self.token_endpoint.clone()),
        ])
    }
}

/// Token emitido pelo endpoint OAuth.
#[derive(Debug, Clone)]
pub struct AccessToken(Secret);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Secret::new(value))
    }

    pub fn bearer(&self) -> &str {
        self.0.expose()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Executa o fluxo client-credentials contra o endpoint configurado.
///
/// # Errors
/// * `ApiError::Auth` se o endpoint recusar as credenciais.
/// * `ApiError::EmptyResponse` se a resposta não trouxer `access_token`.
pub fn acquire_token(client: &Client, config: &OAuthConfig) -> Result<AccessToken, ApiError> {
    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", config.client_id.expose()),
        ("client_secret", config.client_secret.expose()),
        ("resource", config.resource.as_str()),
    ];

    let response = client.post(&config.token_endpoint).form(&form).send()?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().unwrap_or_default();
        return Err(ApiError::Auth { status, detail });
    }

    let body: TokenResponse = response.json()?;
    let token = body
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::EmptyResponse)?;

    log::debug!("Token OAuth obtido em {}", config.token_endpoint);
    Ok(AccessToken::new(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> ServicePrincipal {
        ServicePrincipal {
            client_id: Secret::new("app-id"),
            tenant_id: Secret::new("tenant-42"),
            client_secret: Secret::new("hunter2"),
        }
    }

    #[test]
    fn endpoint_is_templated_with_tenant() {
        let config = OAuthConfig::new(
            &principal(),
            "https://login.microsoftonline.com/{tenant_id}/oauth2/token",
            "https://storage.azure.com/",
        );
        assert_eq!(
            config.token_endpoint,
            "https://login.microsoftonline.com/tenant-42/oauth2/token"
        );
    }

    #[test]
    fn extra_configs_carry_the_five_oauth_entries() {
        let config = OAuthConfig::new(&principal(), "https://x/{tenant_id}/token", "r");
        let map = config.extra_configs();
        assert_eq!(map.len(), 5);
        assert_eq!(map[AUTH_TYPE_KEY], "OAuth");
        assert_eq!(map[CLIENT_ID_KEY], "app-id");
        assert_eq!(map[CLIENT_SECRET_KEY], "hunter2");
        assert_eq!(map[CLIENT_ENDPOINT_KEY], "https://x/tenant-42/token");
        assert!(map[PROVIDER_TYPE_KEY].ends_with("ClientCredsTokenProvider"));
    }

    #[test]
    fn oauth_config_debug_hides_secret() {
        let config = OAuthConfig::new(&principal(), "https://x/{tenant_id}/token", "r");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
