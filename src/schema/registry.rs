// src/schema/registry.rs

use serde_json::{Map, Value};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
    sync::Arc,
};
use tracing::info;

use super::types::{ColumnDef, ColumnType, YearSchema};
use crate::error::{SchemaError, StageError};

/// Immutable year → layout map, fully materialized from the sparse JSON
/// dictionary when loaded. Each column carries a `default` block plus zero
/// or more year-specific override blocks; an override wins key-by-key over
/// the default. A column appears in a year's schema only when the
/// dictionary defines a block for that year.
///
/// Built once per run and read-only afterwards, so it can be shared across
/// concurrently staged years without locking.
#[derive(Debug)]
pub struct SchemaRegistry {
    years: BTreeMap<u16, Arc<YearSchema>>,
    empty: Arc<YearSchema>,
}

impl SchemaRegistry {
    pub fn load(path: &Path) -> Result<Self, StageError> {
        let text = fs::read_to_string(path)?;
        let registry = Self::from_json(&text)?;
        info!(
            dictionary = %path.display(),
            years = registry.years.len(),
            "dictionary materialized"
        );
        Ok(registry)
    }

    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let root: Map<String, Value> = serde_json::from_str(text)?;

        // Column entries in dictionary order, with metadata markers
        // (`__source__` and friends) excluded from the column set.
        let mut columns: Vec<(&str, &Map<String, Value>)> = Vec::new();
        let mut all_years: BTreeSet<u16> = BTreeSet::new();

        for (name, value) in &root {
            if name.starts_with("__") && name.ends_with("__") {
                continue;
            }
            let blocks = value.as_object().ok_or_else(|| SchemaError::BadProperty {
                column: name.clone(),
                year: "default".into(),
                property: "type",
                reason: "column entry is not an object".into(),
            })?;
            if !blocks.contains_key("default") {
                return Err(SchemaError::MissingDefault {
                    column: name.clone(),
                });
            }
            for year_key in blocks.keys().filter(|k| *k != "default") {
                let year = year_key
                    .parse::<u16>()
                    .map_err(|_| SchemaError::BadProperty {
                        column: name.clone(),
                        year: year_key.clone(),
                        property: "year",
                        reason: "is not a four-digit year".into(),
                    })?;
                all_years.insert(year);
            }
            columns.push((name.as_str(), blocks));
        }

        let mut years = BTreeMap::new();
        for year in all_years {
            let key = year.to_string();
            let mut defs = Vec::new();
            for &(name, blocks) in &columns {
                let Some(over) = blocks.get(&key).and_then(Value::as_object) else {
                    continue;
                };
                let default = blocks
                    .get("default")
                    .and_then(Value::as_object)
                    .ok_or_else(|| SchemaError::MissingDefault {
                        column: name.to_string(),
                    })?;
                defs.push(resolve_column(name, &key, default, over)?);
            }
            years.insert(year, Arc::new(YearSchema::new(defs)));
        }

        Ok(Self {
            years,
            empty: YearSchema::empty(),
        })
    }

    /// The resolved layout for `year`. A year the dictionary never mentions
    /// yields an empty schema: absence is normal historical variation, not
    /// a failure.
    pub fn year(&self, year: u16) -> Arc<YearSchema> {
        self.years
            .get(&year)
            .cloned()
            .unwrap_or_else(|| self.empty.clone())
    }

    /// All years the dictionary defines at least one column for, ascending.
    pub fn years(&self) -> Vec<u16> {
        self.years.keys().copied().collect()
    }
}

/// Merge a year override onto the column default (override wins per key)
/// and interpret the result. The published dictionary is loose about JSON
/// types: positions may be numbers or numeric strings, `ordered` may be a
/// bool or `"True"`/`"False"`.
fn resolve_column(
    name: &str,
    year: &str,
    default: &Map<String, Value>,
    over: &Map<String, Value>,
) -> Result<ColumnDef, SchemaError> {
    let get = |key: &str| over.get(key).or_else(|| default.get(key));

    let tag = get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| bad(name, year, "type", "is missing or not a string"))?;
    let ty = ColumnType::parse(tag).ok_or_else(|| SchemaError::UnknownType {
        column: name.to_string(),
        tag: tag.to_string(),
    })?;

    let start = position(name, year, "start", get("start"))?;
    let end = position(name, year, "end", get("end"))?;
    if start > end {
        return Err(bad(
            name,
            year,
            "start",
            format!("{start} is past end column {end}"),
        ));
    }

    let levels = string_list(name, year, "levels", get("levels"))?;
    let labels = string_list(name, year, "labels", get("labels"))?;
    match (&levels, &labels) {
        (Some(lv), Some(lb)) if lv.len() != lb.len() => {
            return Err(SchemaError::LevelLabelMismatch {
                column: name.to_string(),
                year: year.to_string(),
                levels: lv.len(),
                labels: lb.len(),
            });
        }
        (Some(_), None) => return Err(bad(name, year, "labels", "missing alongside levels")),
        (None, Some(_)) => return Err(bad(name, year, "levels", "missing alongside labels")),
        _ => {}
    }

    let ordered = match get("ordered") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "True" || s == "true",
        Some(_) => return Err(bad(name, year, "ordered", "is not a boolean")),
    };

    let na_value = match get("na_value") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => return Err(bad(name, year, "na_value", "is not a string")),
    };

    Ok(ColumnDef {
        name: name.to_string(),
        ty,
        start,
        end,
        levels,
        labels,
        ordered,
        na_value,
    })
}

fn position(
    name: &str,
    year: &str,
    property: &'static str,
    value: Option<&Value>,
) -> Result<usize, SchemaError> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64().map(|v| v as usize),
        Some(Value::String(s)) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v >= 1 => Ok(v),
        _ => Err(bad(name, year, property, "is not a 1-indexed column number")),
    }
}

fn string_list(
    name: &str,
    year: &str,
    property: &'static str,
    value: Option<&Value>,
) -> Result<Option<Vec<String>>, SchemaError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| bad(name, year, property, "is not a list"))?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => out.push(s.clone()),
            Value::Number(n) => out.push(n.to_string()),
            _ => return Err(bad(name, year, property, "contains a non-string entry")),
        }
    }
    Ok(Some(out))
}

fn bad(
    name: &str,
    year: &str,
    property: &'static str,
    reason: impl Into<String>,
) -> SchemaError {
    SchemaError::BadProperty {
        column: name.to_string(),
        year: year.to_string(),
        property,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(json: &str) -> SchemaRegistry {
        SchemaRegistry::from_json(json).unwrap()
    }

    #[test]
    fn year_resolution_follows_dictionary_presence() {
        // A is defined for 2000 and 2001, B for 2000 only.
        let r = registry(
            r#"{
                "a": {"default": {"type": "integer", "start": 1, "end": 3},
                      "2000": {}, "2001": {}},
                "b": {"default": {"type": "character", "start": 4, "end": 5},
                      "2000": {}}
            }"#,
        );
        assert_eq!(r.year(2000).names(), vec!["a", "b"]);
        assert_eq!(r.year(2001).names(), vec!["a"]);
        assert_eq!(r.years(), vec![2000, 2001]);
    }

    #[test]
    fn undefined_year_is_empty_not_an_error() {
        let r = registry(
            r#"{"a": {"default": {"type": "integer", "start": 1, "end": 3}, "2000": {}}}"#,
        );
        assert!(r.year(1968).is_empty());
    }

    #[test]
    fn override_wins_key_by_key() {
        let r = registry(
            r#"{"a": {"default": {"type": "integer", "start": 1, "end": 3},
                      "2001": {"end": 4}}}"#,
        );
        let schema = r.year(2001);
        let col = schema.get("a").unwrap();
        assert_eq!(col.ty, ColumnType::Integer);
        assert_eq!((col.start, col.end), (1, 4));
    }

    #[test]
    fn metadata_markers_are_not_columns() {
        let r = registry(
            r#"{
                "__source__": {"note": "NCHS user guides"},
                "a": {"default": {"type": "integer", "start": 1, "end": 3}, "2000": {}}
            }"#,
        );
        assert_eq!(r.year(2000).names(), vec!["a"]);
    }

    #[test]
    fn positions_accept_numeric_strings() {
        let r = registry(
            r#"{"a": {"default": {"type": "integer", "start": "7", "end": "8"}, "2000": {}}}"#,
        );
        let schema = r.year(2000);
        let col = schema.get("a").unwrap();
        assert_eq!((col.start, col.end), (7, 8));
    }

    #[test]
    fn ordered_accepts_python_style_booleans() {
        let r = registry(
            r#"{"a": {"default": {"type": "integer", "start": 1, "end": 1,
                                   "levels": ["1", "2"], "labels": ["Yes", "No"],
                                   "ordered": "True"},
                      "2000": {}}}"#,
        );
        assert!(r.year(2000).get("a").unwrap().ordered);
    }

    #[test]
    fn missing_default_block_is_fatal() {
        let err = SchemaRegistry::from_json(r#"{"a": {"2000": {"type": "integer"}}}"#)
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingDefault { column } if column == "a"));
    }

    #[test]
    fn unknown_type_tag_is_fatal() {
        let err = SchemaRegistry::from_json(
            r#"{"a": {"default": {"type": "float", "start": 1, "end": 3}, "2000": {}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { tag, .. } if tag == "float"));
    }

    #[test]
    fn level_label_length_mismatch_is_fatal() {
        let err = SchemaRegistry::from_json(
            r#"{"a": {"default": {"type": "integer", "start": 1, "end": 1,
                                   "levels": ["1", "2"], "labels": ["Male"]},
                      "2000": {}}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::LevelLabelMismatch { levels: 2, labels: 1, .. }
        ));
    }

    #[test]
    fn start_past_end_is_fatal() {
        let err = SchemaRegistry::from_json(
            r#"{"a": {"default": {"type": "integer", "start": 5, "end": 3}, "2000": {}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::BadProperty { property: "start", .. }));
    }
}
