//! # Flattened Record to Parquet
//!
//! ## Engenharia de Dados
//! Última etapa do pipeline: colunas sem tipo viram texto, a projeção de saída é
//! aplicada e o resultado é gravado como Parquet no diretório montado, substituindo
//! o conteúdo anterior.

use polars::io::SerReader;
use polars::prelude::StatisticsOptions;
use polars::prelude::*;

use std::io::Cursor;

use crate::errors::{PipelineError, ProcessorError};
use crate::models::join_paths;
use crate::mount::MountTable;

/// Nome do único arquivo gravado no diretório de saída.
pub const PART_FILE: &str = "part-00000.parquet";

/// Converte colunas `Null` (nenhum tipo inferível) para texto anulável.
///
/// Retorna os nomes das colunas convertidas.
pub fn coerce_null_columns(df: &mut DataFrame) -> Result<Vec<String>, ProcessorError> {
    let null_cols: Vec<PlSmallStr> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::Null)
        .map(|c| c.name().clone())
        .collect();

    for name in &null_cols {
        let casted = df.column(name.as_str())?.cast(&DataType::String)?;
        df.with_column(casted)?;
    }

    if !null_cols.is_empty() {
        log::info!("Colunas sem tipo convertidas para texto: {:?}", null_cols);
    }
    Ok(null_cols.into_iter().map(|n| n.to_string()).collect())
}

/// Seleciona as colunas de saída. Lista vazia = todas.
///
/// Nomes são comparados sem diferenciar maiúsculas.
pub fn select_output(df: &DataFrame, requested: &[String]) -> Result<DataFrame, ProcessorError> {
    if requested.is_empty() {
        return Ok(df.clone());
    }

    let available = df.get_column_names_owned();
    let mut selected = Vec::with_capacity(requested.len());
    for wanted in requested {
        let found = available
            .iter()
            .find(|name| name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ProcessorError::Schema(format!("coluna de saída inexistente: {}", wanted))
            })?;
        selected.push(found.clone());
    }
    Ok(df.select(selected)?)
}

/// Serializa o frame em Parquet (Snappy, com estatísticas).
pub fn encode_parquet(df: &mut DataFrame) -> Result<Vec<u8>, ProcessorError> {
    let stats_options = StatisticsOptions {
        min_value: true,
        max_value: true,
        null_count: true,
        distinct_count: false,
    };

    let mut buffer = Vec::new();
    ParquetWriter::new(&mut buffer)
        .with_compression(ParquetCompression::Snappy)
        .with_statistics(stats_options)
        .finish(df)
        .map_err(|e| ProcessorError::Parquet(format!("Erro ao gravar Parquet: {}", e)))?;
    Ok(buffer)
}

/// Lê de volta um Parquet serializado.
pub fn decode_parquet(bytes: Vec<u8>) -> Result<DataFrame, ProcessorError> {
    ParquetReader::new(Cursor::new(bytes))
        .finish()
        .map_err(|e| ProcessorError::Parquet(format!("Erro ao ler Parquet: {}", e)))
}

/// Substitui o conteúdo de `output_dir` por um único arquivo Parquet.
///
/// Retorna o número de **(linhas, colunas)** gravadas.
pub fn write_output(
    mounts: &MountTable,
    output_dir: &str,
    df: &mut DataFrame,
) -> Result<(usize, usize), PipelineError> {
    let bytes = encode_parquet(df)?;

    mounts.delete(output_dir)?;
    let target = join_paths(output_dir, PART_FILE);
    mounts.write(&target, &bytes)?;

    log::info!("Parquet gravado em {} ({} bytes)", target, bytes.len());
    Ok(df.shape())
}
