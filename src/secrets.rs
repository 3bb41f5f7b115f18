//! # Secret Resolution
//!
//! Os três segredos do service principal (client id, tenant id, client secret)
//! são resolvidos no início do job a partir de um cofre externo. Qualquer ausência
//! é fatal e acontece antes de qualquer etapa de dados.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::errors::SecretError;
use crate::models::{SecretProvider, SecretsConfig};

/// Valor sensível. O `Debug` nunca mostra o conteúdo.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Credenciais do service principal.
#[derive(Debug, Clone)]
pub struct ServicePrincipal {
    pub client_id: Secret,
    pub tenant_id: Secret,
    pub client_secret: Secret,
}

/// Fonte de segredos organizada em escopos.
pub trait SecretStore {
    /// Devolve o valor de `key` dentro de `scope`.
    fn get(&self, scope: &str, key: &str) -> Result<Secret, SecretError>;
}

/// Lê segredos de variáveis de ambiente: `SCOPE__KEY`, maiúsculo, com `-` e `.` trocados por `_`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn variable_name(scope: &str, key: &str) -> String {
        format!("{}__{}", scope, key)
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl SecretStore for EnvSecretStore {
    fn get(&self, scope: &str, key: &str) -> Result<Secret, SecretError> {
        std::env::var(Self::variable_name(scope, key))
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Secret::new)
            .ok_or_else(|| SecretError::Missing {
                scope: scope.to_string(),
                key: key.to_string(),
            })
    }
}

/// Cofre em arquivo TOML: uma tabela por escopo.
///
/// ```toml
/// [movie-scope]
/// databricks-client-id = "..."
/// ```
#[derive(Debug, Default, Clone)]
pub struct FileSecretStore {
    scopes: HashMap<String, HashMap<String, String>>,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct ScopeFile(HashMap<String, HashMap<String, String>>);

impl FileSecretStore {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SecretError> {
        let path = path.as_ref();
        let store_err = |message: String| SecretError::Store {
            path: path.display().to_string(),
            message,
        };
        let content = fs::read_to_string(path).map_err(|e| store_err(e.to_string()))?;
        let ScopeFile(scopes) = toml::from_str(&content).map_err(|e| store_err(e.to_string()))?;
        Ok(Self { scopes })
    }

    pub fn from_entries<I, S>(scope: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let values = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut scopes = HashMap::new();
        scopes.insert(scope.to_string(), values);
        Self { scopes }
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, scope: &str, key: &str) -> Result<Secret, SecretError> {
        self.scopes
            .get(scope)
            .and_then(|values| values.get(key))
            .filter(|v| !v.trim().is_empty())
            .map(|v| Secret::new(v.clone()))
            .ok_or_else(|| SecretError::Missing {
                scope: scope.to_string(),
                key: key.to_string(),
            })
    }
}

/// Constrói o cofre descrito na configuração.
pub fn store_from_config(config: &SecretsConfig) -> Result<Box<dyn SecretStore>, SecretError> {
    match config.provider {
        SecretProvider::Env => Ok(Box::new(EnvSecretStore)),
        SecretProvider::File => {
            let path = config.file.as_deref().ok_or_else(|| SecretError::Store {
                path: String::new(),
                message: "secrets.file não informado".to_string(),
            })?;
            Ok(Box::new(FileSecretStore::load(path)?))
        }
    }
}

/// Resolve as três credenciais do service principal. Falha na primeira ausente.
pub fn resolve_principal(
    store: &dyn SecretStore,
    config: &SecretsConfig,
) -> Result<ServicePrincipal, SecretError> {
    let scope = config.scope.as_str();
    let principal = ServicePrincipal {
        client_id: store.get(scope, &config.client_id_key)?,
        tenant_id: store.get(scope, &config.tenant_id_key)?,
        client_secret: store.get(scope, &config.client_secret_key)?,
    };
    log::info!("Segredos resolvidos a partir do escopo '{}'", scope);
    Ok(principal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_store() -> FileSecretStore {
        FileSecretStore::from_entries(
            "movie-scope",
            [
                ("databricks-client-id", "client"),
                ("databricks-tenant-id", "tenant"),
                ("databricks-client-secret", "s3cr3t"),
            ],
        )
    }

    #[test]
    fn resolves_all_three_secrets() {
        let principal = resolve_principal(&full_store(), &SecretsConfig::default()).unwrap();
        assert_eq!(principal.client_id.expose(), "client");
        assert_eq!(principal.tenant_id.expose(), "tenant");
        assert_eq!(principal.client_secret.expose(), "s3cr3t");
    }

    #[test]
    fn missing_secret_names_scope_and_key() {
        let store = FileSecretStore::from_entries(
            "movie-scope",
            [("databricks-client-id", "client"), ("databricks-tenant-id", "tenant")],
        );
        let err = resolve_principal(&store, &SecretsConfig::default()).unwrap_err();
        match err {
            SecretError::Missing { scope, key } => {
                assert_eq!(scope, "movie-scope");
                assert_eq!(key, "databricks-client-secret");
            }
            other => panic!("erro inesperado: {other:?}"),
        }
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let store = FileSecretStore::from_entries("s", [("k", "   ")]);
        assert!(store.get("s", "k").is_err());
    }

    #[test]
    fn debug_output_redacts_values() {
        let principal = resolve_principal(&full_store(), &SecretsConfig::default()).unwrap();
        let printed = format!("{principal:?}");
        assert!(!printed.contains("s3cr3t"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn env_variable_names_are_normalized() {
        assert_eq!(
            EnvSecretStore::variable_name("movie-scope", "databricks-client-id"),
            "MOVIE_SCOPE__DATABRICKS_CLIENT_ID"
        );
    }

    #[test]
    fn file_store_loads_scoped_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "[movie-scope]\ndatabricks-client-id = \"abc\"\n").unwrap();
        let store = FileSecretStore::load(&path).unwrap();
        assert_eq!(store.get("movie-scope", "databricks-client-id").unwrap().expose(), "abc");
        assert!(store.get("other", "databricks-client-id").is_err());
    }
}
