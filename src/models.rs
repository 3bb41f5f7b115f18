//! Metadata-Driven Configuration Models
//!
//! ## Visão Geral
//! Este módulo define as estruturas de dados para a configuração do pipeline de ingestão.
//! Tudo o que o job precisa saber sobre o ambiente (conta de armazenamento, cofre de
//! segredos, caminhos de origem e destino, políticas de parsing) vem de um único TOML.
//!
//! ## Boas Práticas
//! - **Encapsulamento**: Validações de integridade ocorrem no momento da carga.
//! - **Padrões**: Todas as seções têm valores padrão equivalentes ao ambiente de produção,
//!   de modo que um TOML mínimo (`[storage]` + `[source]`) é suficiente.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::PipelineError;

/// Containers que o pipeline espera montar.
pub const RAW_CONTAINER: &str = "raw";
pub const PROCESSED_CONTAINER: &str = "processed";

/// Configuração.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub flatten: FlattenConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Onde os dados moram fisicamente.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Adls,
    Local,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Nome da conta de armazenamento (ex: "moviegoers").
    pub account: String,

    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default = "default_containers")]
    pub containers: Vec<String>,

    /// Raiz do namespace de montagem. Ponto de montagem = `{mount_root}/{account}/{container}`.
    #[serde(default = "default_mount_root")]
    pub mount_root: String,

    /// Diretório que simula a conta quando `backend = "local"`.
    pub local_root: Option<PathBuf>,

    /// Template do endpoint DFS; `{account}` é substituído.
    #[serde(default = "default_dfs_endpoint")]
    pub dfs_endpoint: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Template do endpoint de token; `{tenant_id}` é substituído.
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    #[serde(default = "default_resource")]
    pub resource: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_endpoint: default_token_endpoint(),
            resource: default_resource(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretProvider {
    #[default]
    Env,
    File,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecretsConfig {
    #[serde(default)]
    pub provider: SecretProvider,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_client_id_key")]
    pub client_id_key: String,
    #[serde(default = "default_tenant_id_key")]
    pub tenant_id_key: String,
    #[serde(default = "default_client_secret_key")]
    pub client_secret_key: String,
    /// Arquivo TOML com os segredos quando `provider = "file"`.
    pub file: Option<PathBuf>,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: SecretProvider::default(),
            scope: default_scope(),
            client_id_key: default_client_id_key(),
            tenant_id_key: default_tenant_id_key(),
            client_secret_key: default_client_secret_key(),
            file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_path")]
    pub path: String,
    /// Nome lógico usado no relatório de nulos.
    #[serde(default = "default_logical_name")]
    pub logical_name: String,
    /// `false` = células não parseáveis viram nulo em vez de abortar a leitura.
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
            logical_name: default_logical_name(),
            strict: true,
        }
    }
}

/// O que fazer quando o JSON aninhado de uma célula não é válido.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// A coluna derivada fica nula; a linha segue.
    #[default]
    NullField,
    /// A linha inteira é descartada.
    DropRow,
    /// O job aborta.
    Fail,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FlattenConfig {
    /// Lista fixa de chaves de `belongs_to_collection`. Vazia = descoberta em duas passadas.
    #[serde(default)]
    pub collection_keys: Vec<String>,
    #[serde(default)]
    pub on_malformed: MalformedPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,
    /// Colunas a persistir. Vazia = registro achatado completo.
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            columns: Vec::new(),
        }
    }
}

fn default_containers() -> Vec<String> {
    vec![RAW_CONTAINER.to_string(), PROCESSED_CONTAINER.to_string()]
}
fn default_mount_root() -> String {
    "/mnt".to_string()
}
fn default_dfs_endpoint() -> String {
    "https://{account}.dfs.core.windows.net".to_string()
}
fn default_token_endpoint() -> String {
    "https://login.microsoftonline.com/{tenant_id}/oauth2/token".to_string()
}
fn default_resource() -> String {
    "https://storage.azure.com/".to_string()
}
fn default_scope() -> String {
    "movie-scope".to_string()
}
fn default_client_id_key() -> String {
    "databricks-client-id".to_string()
}
fn default_tenant_id_key() -> String {
    "databricks-tenant-id".to_string()
}
fn default_client_secret_key() -> String {
    "databricks-client-secret".to_string()
}
fn default_source_path() -> String {
    "/mnt/moviegoers/raw/movies_metadata.csv".to_string()
}
fn default_logical_name() -> String {
    "Movies_metadata.csv".to_string()
}
fn default_output_path() -> String {
    "/mnt/moviegoers/processed/metadata".to_string()
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Carrega e valida o ficheiro de configuração TOML.
    ///
    /// # Erros
    /// Retorna `PipelineError::Config` se o ficheiro não for encontrado ou
    /// se a estrutura for inválida.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Falha ao abrir '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse + validação a partir do texto TOML.
    pub fn from_toml(content: &str) -> Result<Self, PipelineError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validação pós-carga (Fail-Fast).
    fn validate(&self) -> Result<(), PipelineError> {
        let storage = &self.storage;
        if storage.account.trim().is_empty() {
            return Err(PipelineError::Config("storage.account vazio".to_string()));
        }
        for required in [RAW_CONTAINER, PROCESSED_CONTAINER] {
            if !storage.containers.iter().any(|c| c == required) {
                return Err(PipelineError::Config(format!(
                    "container '{}' não declarado em storage.containers",
                    required
                )));
            }
        }
        if storage.backend == BackendKind::Local && storage.local_root.is_none() {
            return Err(PipelineError::Config(
                "backend local exige storage.local_root".to_string(),
            ));
        }
        if storage.backend == BackendKind::Adls {
            if !self.auth.token_endpoint.contains("{tenant_id}") {
                return Err(PipelineError::Config(
                    "auth.token_endpoint deve conter '{tenant_id}'".to_string(),
                ));
            }
            if self.secrets.provider == SecretProvider::File && self.secrets.file.is_none() {
                return Err(PipelineError::Config(
                    "secrets.provider = \"file\" exige secrets.file".to_string(),
                ));
            }
        }

        let prefix = self.account_mount_root();
        for (label, path) in [("source.path", &self.source.path), ("output.path", &self.output.path)] {
            if !path.starts_with(&prefix) {
                return Err(PipelineError::Config(format!(
                    "{} ('{}') fora de '{}'",
                    label, path, prefix
                )));
            }
        }
        Ok(())
    }

    /// `{mount_root}/{account}`
    pub fn account_mount_root(&self) -> String {
        join_paths(&self.storage.mount_root, &self.storage.account)
    }

    /// Ponto de montagem de um container.
    pub fn mount_point(&self, container: &str) -> String {
        join_paths(&self.account_mount_root(), container)
    }

    /// URI de origem no formato `abfss://{container}@{account}.dfs.core.windows.net/`.
    pub fn source_uri(&self, container: &str) -> String {
        format!(
            "abfss://{}@{}.dfs.core.windows.net/",
            container, self.storage.account
        )
    }

    /// Endpoint DFS com a conta resolvida.
    pub fn dfs_endpoint(&self) -> String {
        self.storage
            .dfs_endpoint
            .replace("{account}", &self.storage.account)
    }
}

/// Concatenação segura de caminhos sem barras duplicadas.
pub fn join_paths(base: &str, path: &str) -> String {
    let base_trimmed = base.trim_end_matches('/');
    let path_trimmed = path.trim_start_matches('/');
    if path_trimmed.is_empty() {
        return base_trimmed.to_string();
    }
    format!("{}/{}", base_trimmed, path_trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [storage]
        account = "moviegoers"
    "#;

    #[test]
    fn minimal_config_uses_production_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.storage.backend, BackendKind::Adls);
        assert_eq!(config.mount_point("raw"), "/mnt/moviegoers/raw");
        assert_eq!(
            config.source_uri("processed"),
            "abfss://processed@moviegoers.dfs.core.windows.net/"
        );
        assert_eq!(config.dfs_endpoint(), "https://moviegoers.dfs.core.windows.net");
        assert_eq!(config.secrets.scope, "movie-scope");
        assert_eq!(config.flatten.on_malformed, MalformedPolicy::NullField);
        assert!(config.source.strict);
    }

    #[test]
    fn rejects_missing_processed_container() {
        let toml = r#"
            [storage]
            account = "moviegoers"
            containers = ["raw"]
        "#;
        let err = Config::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("processed"));
    }

    #[test]
    fn rejects_local_backend_without_root() {
        let toml = r#"
            [storage]
            account = "moviegoers"
            backend = "local"
        "#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn rejects_paths_outside_the_account_mounts() {
        let toml = r#"
            [storage]
            account = "moviegoers"
            [source]
            path = "/tmp/movies.csv"
        "#;
        let err = Config::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("source.path"));
    }

    #[test]
    fn rejects_token_endpoint_without_tenant() {
        let toml = r#"
            [storage]
            account = "moviegoers"
            [auth]
            token_endpoint = "https://login.example.com/oauth2/token"
        "#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn parses_flatten_policy() {
        let toml = r#"
            [storage]
            account = "moviegoers"
            [flatten]
            collection_keys = ["id", "name"]
            on_malformed = "drop_row"
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.flatten.collection_keys, vec!["id", "name"]);
        assert_eq!(config.flatten.on_malformed, MalformedPolicy::DropRow);
    }

    #[test]
    fn join_paths_avoids_double_slashes() {
        assert_eq!(join_paths("/mnt/", "/moviegoers"), "/mnt/moviegoers");
        assert_eq!(join_paths("/mnt/moviegoers", ""), "/mnt/moviegoers");
    }
}
