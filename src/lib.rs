//! # Movie Metadata Ingestion
//!
//! Monta os containers `raw` e `processed` de uma conta ADLS Gen2 com credenciais OAuth,
//! lê o `movies_metadata.csv`, achata as colunas com JSON embutido e grava o resultado
//! em Parquet.

pub mod api;
pub mod audit;
pub mod auth;
pub mod errors;
pub mod flatten;
mod impl_errors;
pub mod literal;
pub mod loader;
pub mod models;
pub mod mount;
pub mod pipeline;
pub mod processor;
pub mod schema;
pub mod secrets;
