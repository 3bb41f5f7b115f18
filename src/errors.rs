//! # Definição de Erros do Domínio de Ingestão
//!
//! Este módulo centraliza as falhas possíveis em cada camada do pipeline:
//! segredos, autenticação/rede, montagem de containers e transformação (ETL).
//!
//! # Error Handling Strategy
//! - **Tipagem:** Enums por camada para tratamento exaustivo.
//! - **Extensibilidade:** Marcados como `non_exhaustive` para permitir evolução sem quebra de contrato.
//! - **Conversões:** As implementações de `From` para erros de terceiros ficam em `impl_errors`.

use thiserror::Error;

/// Enumeração central de falhas do Processador.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProcessorError {
    /// Falhas no sistema de arquivos (permissão, disco cheio, arquivo inexistente).
    #[error("[I/O] {0}")]
    Io(#[from] std::io::Error),

    /// JSON aninhado inválido numa coluna, quando a política exige falha.
    #[error("[JSON] coluna '{column}', linha {row}: {message}")]
    Json {
        column: String,
        row: usize,
        message: String,
    },

    /// Erros originados na engine (Polars).
    /// Armazenados como `String` para reduzir acoplamento direto.
    #[error("[Engine] {0}")]
    Engine(String),

    /// Falha ao serializar o Parquet de saída.
    #[error("[Parquet] {0}")]
    Parquet(String),

    /// Violações de regras de negócio ou inconsistência de formato nos dados (ex: Schema mismatch).
    #[error("[Schema] {0}")]
    Schema(String),
}

/// Define erros específicos da camada de API/Rede.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Falha na conexão, DNS ou handshake TLS.
    #[error("falha de rede: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// O servidor respondeu, mas com status HTTP de erro.
    #[error("HTTP {status} em {url}")]
    HttpStatusError {
        status: reqwest::StatusCode,
        url: String,
    },

    /// O endpoint de token recusou as credenciais.
    #[error("autenticação recusada ({status}): {detail}")]
    Auth {
        status: reqwest::StatusCode,
        detail: String,
    },

    /// Falha ao criar diretórios ou escrever no disco.
    #[error("falha no sistema de arquivos: {0}")]
    FileSystemError(#[from] std::io::Error),

    /// O servidor respondeu com sucesso, mas nenhum byte útil foi recebido.
    #[error("resposta vazia do servidor")]
    EmptyResponse,
}

/// Falhas na resolução de segredos. Sempre fatais.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SecretError {
    #[error("segredo ausente: escopo '{scope}', chave '{key}'")]
    Missing { scope: String, key: String },

    #[error("não foi possível ler o cofre de segredos '{path}': {message}")]
    Store { path: String, message: String },
}

/// Falhas na tabela de montagem.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MountError {
    /// O ponto de montagem já aponta para outra origem.
    #[error("'{mount_point}' já montado a partir de '{existing}'")]
    Conflict {
        mount_point: String,
        existing: String,
    },

    /// Nenhuma montagem cobre o caminho pedido.
    #[error("caminho fora de qualquer montagem: {0}")]
    NotMounted(String),

    /// A credencial foi rejeitada ou o container não responde.
    #[error("falha ao montar '{source_uri}': {reason}")]
    Unreachable { source_uri: String, reason: String },

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Erro de topo devolvido pelo pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("[Config] {0}")]
    Config(String),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}
