//! Schema declarado do arquivo `movies_metadata.csv`.

use polars::prelude::{DataType, Field, Schema};

/// Tipos primitivos aceitos pelo loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
}

impl ColumnKind {
    pub fn dtype(self) -> DataType {
        match self {
            ColumnKind::Boolean => DataType::Boolean,
            ColumnKind::Int32 => DataType::Int32,
            ColumnKind::Int64 => DataType::Int64,
            ColumnKind::Float32 => DataType::Float32,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Text => DataType::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    Nullable,
    NotNull,
    /// Sem declaração explícita. Carregado como anulável.
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullability: Nullability,
}

const fn nullable(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec {
        name,
        kind,
        nullability: Nullability::Nullable,
    }
}

use ColumnKind::*;

/// Colunas na ordem do cabeçalho do arquivo.
pub const MOVIES_METADATA: &[ColumnSpec] = &[
    nullable("adult", Boolean),
    nullable("belongs_to_collection", Text),
    nullable("budget", Int32),
    nullable("genres", Text),
    nullable("homepage", Text),
    nullable("id", Int32),
    nullable("imdb_id", Text),
    nullable("original_language", Text),
    nullable("original_title", Text),
    nullable("overview", Text),
    nullable("popularity", Float32),
    nullable("poster_path", Text),
    nullable("production_companies", Text),
    nullable("production_countries", Text),
    nullable("release_date", Text),
    nullable("revenue", Int64),
    nullable("runtime", Float64),
    nullable("spoken_languages", Text),
    ColumnSpec {
        name: "status",
        kind: Text,
        nullability: Nullability::Unspecified,
    },
    nullable("tagline", Text),
    nullable("title", Text),
    nullable("video", Boolean),
    nullable("vote_average", Float64),
    nullable("vote_count", Int32),
];

/// Converte a declaração em schema da engine.
pub fn to_polars_schema(columns: &[ColumnSpec]) -> Schema {
    Schema::from_iter(
        columns
            .iter()
            .map(|c| Field::new(c.name.into(), c.kind.dtype())),
    )
}

/// Colunas sem nulidade declarada.
pub fn unspecified_nullability(columns: &[ColumnSpec]) -> impl Iterator<Item = &ColumnSpec> {
    columns
        .iter()
        .filter(|c| c.nullability == Nullability::Unspecified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_all_twenty_four_columns_in_header_order() {
        let schema = to_polars_schema(MOVIES_METADATA);
        assert_eq!(schema.len(), 24);
        let names: Vec<&str> = schema.iter_names().map(|n| n.as_str()).collect();
        assert_eq!(names.first(), Some(&"adult"));
        assert_eq!(names.last(), Some(&"vote_count"));
        assert_eq!(schema.get("revenue"), Some(&DataType::Int64));
        assert_eq!(schema.get("popularity"), Some(&DataType::Float32));
    }

    #[test]
    fn only_status_lacks_explicit_nullability() {
        let names: Vec<&str> = unspecified_nullability(MOVIES_METADATA)
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["status"]);
    }
}
