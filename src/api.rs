//! # ADLS Gen2 REST Access
//!
//! Cliente HTTP compartilhado e o backend de armazenamento que fala com o endpoint
//! DFS de uma conta (um container por instância). Todas as chamadas são bloqueantes:
//! o job é um batch único, sem concorrência própria.

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::time::Duration;

use crate::auth::AccessToken;
use crate::errors::ApiError;
use crate::mount::{FileInfo, StorageBackend};

const STORAGE_API_VERSION: &str = "2021-08-06";

/// Cria o cliente HTTP reutilizável (keep-alive entre chamadas).
pub fn create_http_client() -> Result<Client, ApiError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("movie_ingest/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Um container ADLS Gen2 acessado via REST com bearer token.
#[derive(Debug, Clone)]
pub struct AdlsBackend {
    client: Client,
    /// Ex: `https://moviegoers.dfs.core.windows.net`
    endpoint: String,
    container: String,
    token: AccessToken,
}

#[derive(Deserialize)]
struct PathList {
    #[serde(default)]
    paths: Vec<PathEntry>,
}

#[derive(Deserialize)]
struct PathEntry {
    name: String,
    #[serde(rename = "isDirectory", default)]
    is_directory: Option<Value>,
    #[serde(rename = "contentLength", default)]
    content_length: Option<Value>,
}

impl AdlsBackend {
    pub fn new(client: Client, endpoint: &str, container: &str, token: AccessToken) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            container: container.trim_matches('/').to_string(),
            token,
        }
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.container)
    }

    fn path_url(&self, path: &str) -> String {
        format!("{}/{}", self.container_url(), path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(self.token.bearer())
            .header("x-ms-version", STORAGE_API_VERSION)
    }
}

/// Converte status de erro em `ApiError`. 401/403 contam como falha de autenticação.
fn check_status(response: Response, url: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let detail = response.text().unwrap_or_default();
        return Err(ApiError::Auth { status, detail });
    }
    Err(ApiError::HttpStatusError {
        status,
        url: url.to_string(),
    })
}

/// Campos numéricos/booleanos chegam como string no JSON do serviço.
fn value_as_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn value_as_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

impl StorageBackend for AdlsBackend {
    /// Baixa o arquivo inteiro para memória, exibindo progresso.
    fn read(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.path_url(path);
        let response = self.authorized(self.client.get(&url)).send()?;
        let mut response = check_status(response, &url)?;

        let total_size = response.content_length().unwrap_or(0);
        let pb = ProgressBar::new(total_size);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("Baixando {}", path));

        let mut buffer = Vec::with_capacity(total_size as usize);
        pb.wrap_read(&mut response).read_to_end(&mut buffer)?;
        pb.finish_with_message(format!("Download concluído: {}", path));

        if buffer.is_empty() {
            return Err(ApiError::EmptyResponse);
        }
        Ok(buffer)
    }

    /// Criação (sobrescreve), append único e flush.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), ApiError> {
        let url = self.path_url(path);

        let created = self
            .authorized(self.client.put(&url))
            .query(&[("resource", "file")])
            .header("Content-Length", "0")
            .send()?;
        check_status(created, &url)?;

        if !bytes.is_empty() {
            let appended = self
                .authorized(self.client.patch(&url))
                .query(&[("action", "append"), ("position", "0")])
                .body(bytes.to_vec())
                .send()?;
            check_status(appended, &url)?;
        }

        let length = bytes.len().to_string();
        let flushed = self
            .authorized(self.client.patch(&url))
            .query(&[("action", "flush"), ("position", length.as_str())])
            .header("Content-Length", "0")
            .send()?;
        check_status(flushed, &url)?;

        log::debug!("Gravados {} bytes em {}", bytes.len(), url);
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.path_url(path);
        let response = self
            .authorized(self.client.delete(&url))
            .query(&[("recursive", "true")])
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response, &url)?;
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<FileInfo>, ApiError> {
        let url = self.container_url();
        let directory = path.trim_matches('/');
        let mut query = vec![("resource", "filesystem"), ("recursive", "false")];
        if !directory.is_empty() {
            query.push(("directory", directory));
        }

        let response = self
            .authorized(self.client.get(&url))
            .query(&query)
            .send()?;
        let listing: PathList = check_status(response, &url)?.json()?;

        Ok(listing
            .paths
            .into_iter()
            .map(|entry| {
                let name = entry
                    .name
                    .rsplit('/')
                    .next()
                    .unwrap_or(entry.name.as_str())
                    .to_string();
                FileInfo {
                    name,
                    size: value_as_u64(entry.content_length.as_ref()),
                    is_dir: value_as_bool(entry.is_directory.as_ref()),
                    path: entry.name,
                }
            })
            .collect())
    }
}
