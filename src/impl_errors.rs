//! Conversões de erros de terceiros para os enums do sistema
//!
//! Este módulo existe exclusivamente para desacoplar:
//! - definição de erros (enums, em `errors`)
//! - conversão de erros das bibliotecas externas (Polars, TOML)
//!
//! Mensagens são achatadas em `String` para que nenhuma camada exponha tipos da engine.

use polars::prelude::PolarsError;

use crate::errors::{PipelineError, ProcessorError};

/* ========================================================================== */
/* Engine                                                                     */
/* ========================================================================== */

impl From<PolarsError> for ProcessorError {
    fn from(err: PolarsError) -> Self {
        match err {
            PolarsError::SchemaMismatch(msg) | PolarsError::ColumnNotFound(msg) => {
                ProcessorError::Schema(msg.to_string())
            }
            PolarsError::IO { error, .. } => match std::sync::Arc::try_unwrap(error) {
                Ok(io) => ProcessorError::Io(io),
                Err(shared) => ProcessorError::Engine(shared.to_string()),
            },
            other => ProcessorError::Engine(other.to_string()),
        }
    }
}

impl From<PolarsError> for PipelineError {
    fn from(err: PolarsError) -> Self {
        PipelineError::Processor(err.into())
    }
}

/* ========================================================================== */
/* Configuração                                                               */
/* ========================================================================== */

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::Config(format!("Erro no TOML: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn missing_column_maps_to_schema_error() {
        let df = df!("a" => [1i32, 2]).unwrap();
        let err: ProcessorError = df.column("b").unwrap_err().into();
        assert!(matches!(err, ProcessorError::Schema(_)));
    }

    #[test]
    fn toml_error_maps_to_config() {
        let err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: PipelineError = err.into();
        assert!(err.to_string().starts_with("[Config]"));
    }
}
