//! # JSON Flattening
//!
//! Extrai campos do JSON embutido em colunas de texto para colunas próprias:
//!
//! 1. **Normalização**: `"[]"` vira um objeto placeholder (`name = 'Unknown'`), para que
//!    "sem dados" seja explícito e não se confunda com falha de parsing.
//! 2. **Projeção de objeto** (`belongs_to_collection`): uma coluna por chave. As chaves vêm
//!    da lista fixa da configuração ou são descobertas no próprio dado (duas passadas:
//!    coleta das chaves, depois materialização).
//! 3. **Projeção de array** (`genres`, `production_companies`, `production_countries`):
//!    os `name` de cada elemento, em ordem, unidos por vírgula.
//!
//! Um nome que contenha vírgula torna a coluna unida ambígua; a limitação é mantida.

use polars::prelude::*;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::ProcessorError;
use crate::literal;
use crate::models::{FlattenConfig, MalformedPolicy};

pub const COLLECTION_COLUMN: &str = "belongs_to_collection";
pub const EMPTY_ARRAY: &str = "[]";
pub const UNKNOWN: &str = "Unknown";
pub const NAME_SEPARATOR: &str = ",";

/// Coluna de array de objetos e a coluna de texto derivada dela.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayColumnSpec {
    pub column: &'static str,
    pub output: &'static str,
    /// Substitui `"[]"` antes do parsing.
    pub placeholder: &'static str,
    /// Elementos devem ter `id` inteiro além de `name`.
    pub requires_id: bool,
}

pub const ARRAY_COLUMNS: [ArrayColumnSpec; 3] = [
    ArrayColumnSpec {
        column: "genres",
        output: "genres_value",
        placeholder: "[{'id': 0, 'name': 'Unknown'}]",
        requires_id: true,
    },
    ArrayColumnSpec {
        column: "production_companies",
        output: "production_companies_values",
        placeholder: "[{'name': 'Unknown', 'id': 0}]",
        requires_id: true,
    },
    // países trazem `iso_3166_1` no lugar de `id`
    ArrayColumnSpec {
        column: "production_countries",
        output: "production_countries_values",
        placeholder: "[{'iso_3166_1': 'Unknown', 'name': 'Unknown'}]",
        requires_id: false,
    },
];

/// Chaves distintas observadas em `belongs_to_collection`, em ordem alfabética.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionKeySet(BTreeSet<String>);

impl CollectionKeySet {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }
}

/// Resumo da etapa de achatamento.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenReport {
    /// Colunas adicionadas a partir de `belongs_to_collection`, na ordem em que entraram.
    pub collection_columns: Vec<String>,
    /// Chaves observadas fora da lista fixa (só no modo de chaves fixas).
    pub unexpected_keys: Vec<String>,
    /// Células com JSON inválido, por coluna de origem.
    pub malformed: BTreeMap<String, usize>,
    pub rows_dropped: usize,
}

type CollectionMap = BTreeMap<String, Option<String>>;

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, ProcessorError> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Troca `"[]"` pelo placeholder de cada coluna de array.
pub fn normalize_empty_arrays(df: &mut DataFrame) -> Result<(), ProcessorError> {
    for spec in ARRAY_COLUMNS {
        let normalized: Vec<Option<String>> = string_values(df, spec.column)?
            .into_iter()
            .map(|v| {
                v.map(|text| {
                    if text.trim() == EMPTY_ARRAY {
                        spec.placeholder.to_string()
                    } else {
                        text
                    }
                })
            })
            .collect();
        df.with_column(Series::new(spec.column.into(), normalized))?;
    }
    Ok(())
}

/// Texto de um valor escalar do mapa. `null` vira ausência.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Interpreta uma célula como mapa string → string.
pub fn parse_collection(text: &str) -> Result<CollectionMap, String> {
    match literal::parse(text).map_err(|e| e.to_string())? {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, scalar_text(v)))
            .collect()),
        other => Err(format!("esperado objeto, encontrado {}", json_kind(&other))),
    }
}

/// Extrai os `name` de um array de objetos, em ordem.
///
/// `name` nulo omite o elemento; número ou booleano entra na forma textual.
pub fn extract_names(text: &str, requires_id: bool) -> Result<Vec<String>, String> {
    let items = match literal::parse(text).map_err(|e| e.to_string())? {
        Value::Array(items) => items,
        other => return Err(format!("esperado array, encontrado {}", json_kind(&other))),
    };

    let names = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let Value::Object(mut fields) = item else {
                return Err(format!("elemento {} não é objeto", i));
            };
            if requires_id && !fields.get("id").is_some_and(|id| id.as_i64().is_some()) {
                return Err(format!("elemento {} sem 'id' inteiro", i));
            }
            match fields.remove("name") {
                Some(Value::String(name)) => Ok(Some(name)),
                Some(Value::Null) => Ok(None),
                Some(scalar @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(scalar.to_string())),
                Some(other) => Err(format!("elemento {} com 'name' {}", i, json_kind(&other))),
                None => Err(format!("elemento {} sem 'name'", i)),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.into_iter().flatten().collect())
}

pub fn join_names(names: &[String]) -> String {
    names.join(NAME_SEPARATOR)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "booleano",
        Value::Number(_) => "número",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "objeto",
    }
}

/// Aplica a política de JSON inválido a uma célula.
struct MalformedTracker {
    policy: MalformedPolicy,
    counts: BTreeMap<String, usize>,
    keep: Vec<bool>,
}

impl MalformedTracker {
    fn new(policy: MalformedPolicy, height: usize) -> Self {
        Self {
            policy,
            counts: BTreeMap::new(),
            keep: vec![true; height],
        }
    }

    fn record(&mut self, column: &str, row: usize, message: String) -> Result<(), ProcessorError> {
        *self.counts.entry(column.to_string()).or_default() += 1;
        match self.policy {
            MalformedPolicy::NullField => {
                log::debug!("JSON inválido em '{}' linha {}: {}", column, row, message);
            }
            MalformedPolicy::DropRow => self.keep[row] = false,
            MalformedPolicy::Fail => {
                return Err(ProcessorError::Json {
                    column: column.to_string(),
                    row,
                    message,
                });
            }
        }
        Ok(())
    }
}

fn project_collection(
    df: &mut DataFrame,
    fixed_keys: &[String],
    tracker: &mut MalformedTracker,
    report: &mut FlattenReport,
) -> Result<(), ProcessorError> {
    let mut maps: Vec<Option<CollectionMap>> = Vec::with_capacity(df.height());
    for (row, cell) in string_values(df, COLLECTION_COLUMN)?.into_iter().enumerate() {
        let map = match cell.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => match parse_collection(text) {
                Ok(map) => Some(map),
                Err(message) => {
                    tracker.record(COLLECTION_COLUMN, row, message)?;
                    None
                }
            },
        };
        maps.push(map);
    }

    let observed = CollectionKeySet(
        maps.iter()
            .flatten()
            .flat_map(|m| m.keys().cloned())
            .collect(),
    );
    let keys: Vec<String> = if fixed_keys.is_empty() {
        log::info!(
            "{} chaves descobertas em '{}'",
            observed.len(),
            COLLECTION_COLUMN
        );
        observed.keys().map(str::to_string).collect()
    } else {
        report.unexpected_keys = observed
            .keys()
            .filter(|k| !fixed_keys.iter().any(|f| f == k))
            .map(str::to_string)
            .collect();
        if !report.unexpected_keys.is_empty() {
            log::warn!(
                "Chaves de '{}' fora da lista fixa foram ignoradas: {:?}",
                COLLECTION_COLUMN,
                report.unexpected_keys
            );
        }
        for key in fixed_keys.iter().filter(|k| !observed.contains(k)) {
            log::debug!("Chave fixa '{}' não observada no dado", key);
        }
        fixed_keys.to_vec()
    };

    for key in &keys {
        if df.column(key).is_ok() {
            return Err(ProcessorError::Schema(format!(
                "chave '{}' de '{}' colide com coluna existente",
                key, COLLECTION_COLUMN
            )));
        }
    }

    let height = df.height();
    for key in keys {
        let values: Vec<Option<String>> = maps
            .iter()
            .map(|m| m.as_ref().and_then(|m| m.get(&key).cloned().flatten()))
            .collect();
        let series = if values.iter().all(Option::is_none) {
            // nenhum valor observado: coluna sem tipo
            Series::full_null(key.as_str().into(), height, &DataType::Null)
        } else {
            Series::new(key.as_str().into(), values)
        };
        df.with_column(series)?;
        report.collection_columns.push(key);
    }
    Ok(())
}

fn project_arrays(
    df: &mut DataFrame,
    tracker: &mut MalformedTracker,
) -> Result<(), ProcessorError> {
    for spec in ARRAY_COLUMNS {
        if df.column(spec.output).is_ok() {
            return Err(ProcessorError::Schema(format!(
                "coluna de saída '{}' já existe",
                spec.output
            )));
        }
        let mut joined: Vec<Option<String>> = Vec::with_capacity(df.height());
        for (row, cell) in string_values(df, spec.column)?.into_iter().enumerate() {
            let value = match cell {
                None => None,
                Some(text) => match extract_names(&text, spec.requires_id) {
                    Ok(names) => Some(join_names(&names)),
                    Err(message) => {
                        tracker.record(spec.column, row, message)?;
                        None
                    }
                },
            };
            joined.push(value);
        }
        df.with_column(Series::new(spec.output.into(), joined))?;
    }
    Ok(())
}

/// Projeções de objeto e de array seguidas da política de linhas inválidas.
///
/// Espera o frame já normalizado por `normalize_empty_arrays`.
pub fn flatten(
    mut df: DataFrame,
    config: &FlattenConfig,
) -> Result<(DataFrame, FlattenReport), ProcessorError> {
    let mut report = FlattenReport::default();
    let mut tracker = MalformedTracker::new(config.on_malformed, df.height());

    project_collection(&mut df, &config.collection_keys, &mut tracker, &mut report)?;
    project_arrays(&mut df, &mut tracker)?;

    report.malformed = tracker.counts;
    report.rows_dropped = tracker.keep.iter().filter(|k| !**k).count();
    if report.rows_dropped > 0 {
        let mask = BooleanChunked::new("keep".into(), tracker.keep.as_slice());
        df = df.filter(&mask)?;
    }

    log::info!(
        "Achatamento: {} colunas de coleção {:?}, JSON inválido {:?}, {} linhas descartadas",
        report.collection_columns.len(),
        report.collection_columns,
        report.malformed,
        report.rows_dropped
    );
    Ok((df, report))
}
