//! # Load & Clean
//!
//! Lê o CSV bruto sob o schema declarado, renomeia as colunas que colidiriam com
//! campos extraídos do JSON aninhado e descarta linhas incompletas.

use polars::io::SerReader;
use polars::prelude::*;
use std::io::Cursor;
use std::sync::Arc;

use crate::errors::ProcessorError;
use crate::schema::{self, ColumnSpec, Nullability};

/// Renomeações aplicadas logo após a leitura.
pub const RENAMES: [(&str, &str); 2] = [
    ("id", "id_original"),
    ("poster_path", "poster_path_original"),
];

/// Linhas sem qualquer uma destas colunas são descartadas antes do parsing de JSON.
pub const REQUIRED_COLUMNS: [&str; 2] = ["production_companies", "production_countries"];

/// Contagem de linhas antes e depois da limpeza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_kept: usize,
}

impl LoadReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_read - self.rows_kept
    }
}

fn parse_options() -> CsvParseOptions {
    CsvParseOptions::default()
        .with_separator(b',')
        .with_quote_char(Some(b'"'))
        .with_missing_is_null(true)
}

/// Nomes do cabeçalho lidos pela engine, sem materializar linhas.
fn read_header(bytes: &[u8]) -> Result<Vec<String>, ProcessorError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_n_rows(Some(0))
        .with_infer_schema_length(Some(0))
        .with_parse_options(parse_options())
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| ProcessorError::Schema(format!("Falha ao ler o cabeçalho: {}", e)))?;
    Ok(df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect())
}

fn validate_header(bytes: &[u8], columns: &[ColumnSpec]) -> Result<(), ProcessorError> {
    let found = read_header(bytes)?;
    let expected: Vec<&str> = columns.iter().map(|c| c.name).collect();
    if found.len() != expected.len() || found.iter().zip(&expected).any(|(f, e)| f != e) {
        return Err(ProcessorError::Schema(format!(
            "cabeçalho não confere com o schema: esperado {:?}, encontrado {:?}",
            expected, found
        )));
    }
    Ok(())
}

/// Lê o CSV com cabeçalho, campos entre aspas (multi-linha, `""` como escape)
/// e os tipos declarados.
///
/// # Errors
/// `ProcessorError::Schema` se o cabeçalho divergir do schema ou, com `strict = true`,
/// se alguma célula não puder ser convertida ao tipo declarado.
pub fn read_csv(
    bytes: Vec<u8>,
    columns: &[ColumnSpec],
    strict: bool,
) -> Result<DataFrame, ProcessorError> {
    validate_header(&bytes, columns)?;

    for spec in schema::unspecified_nullability(columns) {
        log::warn!(
            "Coluna '{}' sem nulidade declarada; tratada como anulável",
            spec.name
        );
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema(Some(Arc::new(schema::to_polars_schema(columns))))
        .with_parse_options(parse_options())
        .with_ignore_errors(!strict)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| ProcessorError::Schema(format!("Falha no parsing CSV: {}", e)))?;

    for spec in columns
        .iter()
        .filter(|c| c.nullability == Nullability::NotNull)
    {
        let nulls = df.column(spec.name)?.null_count();
        if nulls > 0 {
            return Err(ProcessorError::Schema(format!(
                "coluna não anulável '{}' com {} nulos",
                spec.name, nulls
            )));
        }
    }

    Ok(df)
}

/// `id` → `id_original`, `poster_path` → `poster_path_original`.
pub fn rename_ambiguous(df: &mut DataFrame) -> Result<(), ProcessorError> {
    for (from, to) in RENAMES {
        df.rename(from, to.into())?;
    }
    Ok(())
}

/// Remove as linhas com nulo em qualquer coluna de `REQUIRED_COLUMNS`.
pub fn drop_incomplete(df: DataFrame) -> Result<DataFrame, ProcessorError> {
    let predicate = REQUIRED_COLUMNS
        .iter()
        .fold(lit(true), |acc, name| acc.and(col(*name).is_not_null()));
    Ok(df.lazy().filter(predicate).collect()?)
}

/// Leitura + renomeação + descarte, na ordem do pipeline.
pub fn load_and_clean(
    bytes: Vec<u8>,
    strict: bool,
) -> Result<(DataFrame, LoadReport), ProcessorError> {
    let mut df = read_csv(bytes, schema::MOVIES_METADATA, strict)?;
    let rows_read = df.height();

    rename_ambiguous(&mut df)?;
    let df = drop_incomplete(df)?;

    let report = LoadReport {
        rows_read,
        rows_kept: df.height(),
    };
    log::info!(
        "CSV carregado: {} linhas lidas, {} descartadas por nulos em {:?}",
        report.rows_read,
        report.rows_dropped(),
        REQUIRED_COLUMNS
    );
    Ok((df, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "adult,belongs_to_collection,budget,genres,homepage,id,imdb_id,original_language,original_title,overview,popularity,poster_path,production_companies,production_countries,release_date,revenue,runtime,spoken_languages,status,tagline,title,video,vote_average,vote_count";

    fn csv(rows: &[&str]) -> Vec<u8> {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        text.into_bytes()
    }

    const TOY_STORY: &str = r#"False,"{'id': 10194, 'name': 'Toy Story Collection'}",30000000,"[{'id': 16, 'name': 'Animation'}]",http://toystory.disney.com,862,tt0114709,en,Toy Story,"Led by Woody, Andy's toys live happily.",21.946943,/rhIRbceoE9lR4veEXuwCC2wARtG.jpg,"[{'name': 'Pixar Animation Studios', 'id': 3}]","[{'iso_3166_1': 'US', 'name': 'United States of America'}]",1995-10-30,373554033,81.0,"[{'iso_639_1': 'en', 'name': 'English'}]",Released,,Toy Story,False,7.7,5415"#;

    #[test]
    fn header_is_read_with_quotes_bom_and_crlf() {
        assert_eq!(
            read_header(b"a,\"b,c\",d\r\n1,2,3\r\n").unwrap(),
            vec!["a", "b,c", "d"]
        );
        assert_eq!(read_header(b"\xEF\xBB\xBFa,b\n1,2\n").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn byte_order_mark_does_not_break_validation() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend(csv(&[TOY_STORY]));
        let df = read_csv(bytes, schema::MOVIES_METADATA, true).unwrap();
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn reads_typed_columns_and_quoted_fields() {
        let df = read_csv(csv(&[TOY_STORY]), schema::MOVIES_METADATA, true).unwrap();
        assert_eq!(df.shape(), (1, 24));
        assert_eq!(df.column("budget").unwrap().dtype(), &DataType::Int32);
        assert_eq!(df.column("adult").unwrap().bool().unwrap().get(0), Some(false));
        assert_eq!(
            df.column("overview").unwrap().str().unwrap().get(0),
            Some("Led by Woody, Andy's toys live happily.")
        );
        assert_eq!(df.column("tagline").unwrap().null_count(), 1);
    }

    #[test]
    fn quoted_fields_may_span_lines_and_escape_quotes() {
        let row = TOY_STORY.replace(
            "\"Led by Woody, Andy's toys live happily.\"",
            "\"Line one\nsays \"\"hi\"\"\"",
        );
        let df = read_csv(csv(&[&row]), schema::MOVIES_METADATA, true).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(
            df.column("overview").unwrap().str().unwrap().get(0),
            Some("Line one\nsays \"hi\"")
        );
    }

    #[test]
    fn strict_mode_rejects_unparseable_cells() {
        let row = TOY_STORY.replacen("30000000", "/bad.jpg", 1);
        let err = read_csv(csv(&[&row]), schema::MOVIES_METADATA, true).unwrap_err();
        assert!(matches!(err, ProcessorError::Schema(_)));
    }

    #[test]
    fn permissive_mode_nulls_unparseable_cells() {
        let row = TOY_STORY.replacen("30000000", "/bad.jpg", 1);
        let df = read_csv(csv(&[&row]), schema::MOVIES_METADATA, false).unwrap();
        assert_eq!(df.column("budget").unwrap().null_count(), 1);
    }

    #[test]
    fn header_mismatch_is_a_schema_error() {
        let err = read_csv(b"a,b\n1,2\n".to_vec(), schema::MOVIES_METADATA, true).unwrap_err();
        assert!(err.to_string().contains("cabeçalho"));
    }

    #[test]
    fn renames_and_drops_rows_missing_required_columns() {
        let missing_countries = TOY_STORY.replace(
            "\"[{'iso_3166_1': 'US', 'name': 'United States of America'}]\"",
            "",
        );
        let (df, report) = load_and_clean(csv(&[TOY_STORY, &missing_countries]), true).unwrap();

        assert_eq!(report, LoadReport { rows_read: 2, rows_kept: 1 });
        assert!(df.column("id_original").is_ok());
        assert!(df.column("poster_path_original").is_ok());
        assert!(df.column("id").is_err());
        for name in REQUIRED_COLUMNS {
            assert_eq!(df.column(name).unwrap().null_count(), 0);
        }
    }
}
