//! Contagem de nulos/NaN por coluna, apenas para diagnóstico.

use polars::prelude::*;
use std::fmt;

use crate::errors::ProcessorError;

/// Resultado da auditoria de um arquivo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullAudit {
    pub logical_name: String,
    /// `(coluna, nulos + NaN)` na ordem das colunas do frame.
    pub counts: Vec<(String, usize)>,
}

fn is_audited(dtype: &DataType) -> bool {
    !matches!(dtype, DataType::Boolean | DataType::Datetime(_, _))
}

/// Conta, para cada coluna que não seja booleana nem timestamp, as linhas nulas
/// ou (em colunas de ponto flutuante) NaN. Não altera o frame.
pub fn null_audit(df: &DataFrame, logical_name: &str) -> Result<NullAudit, ProcessorError> {
    let mut counts = Vec::new();
    for column in df.get_columns() {
        if !is_audited(column.dtype()) {
            continue;
        }
        let nan = match column.dtype() {
            DataType::Float32 | DataType::Float64 => column.is_nan()?.num_trues(),
            _ => 0,
        };
        counts.push((column.name().to_string(), column.null_count() + nan));
    }
    Ok(NullAudit {
        logical_name: logical_name.to_string(),
        counts,
    })
}

impl NullAudit {
    pub fn count(&self, column: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, n)| *n)
    }

    /// Uma linha, uma coluna por coluna auditada.
    pub fn to_dataframe(&self) -> Result<DataFrame, ProcessorError> {
        let columns = self
            .counts
            .iter()
            .map(|(name, n)| Column::new(name.as_str().into(), [*n as u64]))
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

impl fmt::Display for NullAudit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Column stats for data file : {}", self.logical_name)?;
        match self.to_dataframe() {
            Ok(df) => write!(f, "{}", df),
            Err(_) => {
                for (name, n) in &self.counts {
                    writeln!(f, "{:<32} {}", name, n)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_nulls_and_nans_and_skips_booleans() {
        let df = df!(
            "title" => [Some("a"), None, Some("c")],
            "popularity" => [Some(1.0f32), Some(f32::NAN), None],
            "budget" => [Some(1i32), Some(2), Some(3)],
            "adult" => [Some(true), None, Some(false)]
        )
        .unwrap();

        let audit = null_audit(&df, "Movies_metadata.csv").unwrap();
        assert_eq!(audit.count("title"), Some(1));
        assert_eq!(audit.count("popularity"), Some(2));
        assert_eq!(audit.count("budget"), Some(0));
        assert_eq!(audit.count("adult"), None);
        assert_eq!(audit.counts.len(), 3);
    }

    #[test]
    fn audit_does_not_modify_the_frame() {
        let df = df!("x" => [Some(1.5f64), None]).unwrap();
        let before = df.clone();
        null_audit(&df, "f").unwrap();
        assert!(df.equals_missing(&before));
    }

    #[test]
    fn renders_heading_and_table() {
        let audit = NullAudit {
            logical_name: "Movies_metadata.csv".to_string(),
            counts: vec![("genres".to_string(), 0), ("tagline".to_string(), 4)],
        };
        let df = audit.to_dataframe().unwrap();
        assert_eq!(df.shape(), (1, 2));
        let text = audit.to_string();
        assert!(text.starts_with("Column stats for data file : Movies_metadata.csv"));
        assert!(text.contains("tagline"));
    }
}
