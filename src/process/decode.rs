// src/process/decode.rs
//
// One decoding contract for every execution path: slice the line by the
// column's declared 1-indexed inclusive range, run NA/categorical
// post-processing on the raw slice, then coerce by type.

use serde::Deserialize;
use std::borrow::Cow;

use crate::error::DecodeError;
use crate::process::post;
use crate::schema::{ColumnDef, ColumnType, YearSchema};

/// A decoded field. `Logical` and `Text` carry the raw slice verbatim;
/// trailing blanks inside a non-missing character field are preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Missing,
    Integer(i64),
    Numeric(f64),
    Logical(String),
    Text(String),
}

/// What to do when a slice cannot be coerced to its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercePolicy {
    /// Abort the year. The raw files are machine-produced, so a bad slice
    /// usually means the dictionary positions are wrong.
    #[default]
    Strict,
    /// Coerce to missing and continue.
    Lenient,
}

/// One accepted input line, values aligned with the schema's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub values: Vec<FieldValue>,
}

/// Decode one raw line against a resolved schema. Returns `None` for a
/// whitespace-only line, which is skipped entirely rather than decoded.
pub fn decode_line(
    line: &str,
    schema: &YearSchema,
    policy: CoercePolicy,
) -> Result<Option<DecodedRecord>, DecodeError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let mut values = Vec::with_capacity(schema.len());
    for col in schema.columns() {
        let raw = slice_field(line, col.start, col.end);
        values.push(decode_field(col, &raw, policy)?);
    }
    Ok(Some(DecodedRecord { values }))
}

/// Decode a single already-sliced field.
pub fn decode_field(
    col: &ColumnDef,
    raw: &str,
    policy: CoercePolicy,
) -> Result<FieldValue, DecodeError> {
    let value = match col.ty {
        ColumnType::Na => FieldValue::Missing,
        _ => match post::apply(col, raw) {
            Some(replaced) => replaced,
            None => coerce(col, raw, policy)?,
        },
    };
    Ok(value)
}

fn coerce(col: &ColumnDef, raw: &str, policy: CoercePolicy) -> Result<FieldValue, DecodeError> {
    let value = match col.ty {
        ColumnType::Integer => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                FieldValue::Missing
            } else {
                match trimmed.parse::<i64>() {
                    Ok(v) => FieldValue::Integer(v),
                    Err(_) if policy == CoercePolicy::Lenient => FieldValue::Missing,
                    Err(_) => {
                        return Err(DecodeError::Integer {
                            column: col.name.clone(),
                            raw: trimmed.to_string(),
                        })
                    }
                }
            }
        }
        ColumnType::Numeric => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                FieldValue::Missing
            } else {
                match trimmed.parse::<f64>() {
                    Ok(v) => FieldValue::Numeric(round1(v)),
                    Err(_) if policy == CoercePolicy::Lenient => FieldValue::Missing,
                    Err(_) => {
                        return Err(DecodeError::Numeric {
                            column: col.name.clone(),
                            raw: trimmed.to_string(),
                        })
                    }
                }
            }
        }
        ColumnType::Logical => {
            if raw.trim().is_empty() {
                FieldValue::Missing
            } else {
                FieldValue::Logical(raw.to_string())
            }
        }
        ColumnType::Character => {
            if raw.is_empty() || raw.starts_with(' ') {
                FieldValue::Missing
            } else {
                FieldValue::Text(raw.to_string())
            }
        }
        ColumnType::Na => FieldValue::Missing,
    };
    Ok(value)
}

/// Round half away from zero to one decimal place. Output carries exactly
/// one decimal digit, so this is the single rounding rule for the run.
fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Extract the 1-indexed inclusive `[start, end]` range as a zero-indexed
/// half-open slice. Short lines behave as if blank-padded to the right.
/// Ranges are character positions, matching the published layouts.
fn slice_field(line: &str, start: usize, end: usize) -> Cow<'_, str> {
    let from = start - 1;
    let width = end - start + 1;

    if line.is_ascii() {
        let len = line.len();
        if end <= len {
            return Cow::Borrowed(&line[from..end]);
        }
        let mut s = String::with_capacity(width);
        if from < len {
            s.push_str(&line[from..]);
        }
        while s.len() < width {
            s.push(' ');
        }
        return Cow::Owned(s);
    }

    let mut s = String::with_capacity(width);
    let mut taken = 0;
    for c in line.chars().skip(from).take(width) {
        s.push(c);
        taken += 1;
    }
    for _ in taken..width {
        s.push(' ');
    }
    Cow::Owned(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;

    fn col(ty: ColumnType, start: usize, end: usize) -> ColumnDef {
        ColumnDef {
            name: "f".into(),
            ty,
            start,
            end,
            levels: None,
            labels: None,
            ordered: false,
            na_value: None,
        }
    }

    #[test]
    fn blank_integer_slice_is_missing() {
        let c = col(ColumnType::Integer, 1, 3);
        assert_eq!(
            decode_field(&c, "   ", CoercePolicy::Strict).unwrap(),
            FieldValue::Missing
        );
    }

    #[test]
    fn padded_integer_parses() {
        let c = col(ColumnType::Integer, 1, 3);
        assert_eq!(
            decode_field(&c, " 12", CoercePolicy::Strict).unwrap(),
            FieldValue::Integer(12)
        );
    }

    #[test]
    fn numeric_rounds_to_one_decimal() {
        let c = col(ColumnType::Numeric, 1, 6);
        assert_eq!(
            decode_field(&c, "12.345", CoercePolicy::Strict).unwrap(),
            FieldValue::Numeric(12.3)
        );
    }

    #[test]
    fn logical_passes_raw_character_through() {
        let c = col(ColumnType::Logical, 1, 1);
        assert_eq!(
            decode_field(&c, "Y", CoercePolicy::Strict).unwrap(),
            FieldValue::Logical("Y".into())
        );
        assert_eq!(
            decode_field(&c, " ", CoercePolicy::Strict).unwrap(),
            FieldValue::Missing
        );
    }

    #[test]
    fn character_leading_blank_is_missing_and_trailing_blanks_survive() {
        let c = col(ColumnType::Character, 1, 4);
        assert_eq!(
            decode_field(&c, " ABC", CoercePolicy::Strict).unwrap(),
            FieldValue::Missing
        );
        assert_eq!(
            decode_field(&c, "AB  ", CoercePolicy::Strict).unwrap(),
            FieldValue::Text("AB  ".into())
        );
    }

    #[test]
    fn na_type_ignores_slice_content() {
        let c = col(ColumnType::Na, 1, 2);
        assert_eq!(
            decode_field(&c, "42", CoercePolicy::Strict).unwrap(),
            FieldValue::Missing
        );
    }

    #[test]
    fn bad_slice_is_fatal_under_strict_and_missing_under_lenient() {
        let c = col(ColumnType::Integer, 1, 2);
        assert!(decode_field(&c, "XY", CoercePolicy::Strict).is_err());
        assert_eq!(
            decode_field(&c, "XY", CoercePolicy::Lenient).unwrap(),
            FieldValue::Missing
        );
    }

    #[test]
    fn short_lines_are_blank_padded() {
        let c = col(ColumnType::Integer, 10, 12);
        // line ends before the field starts
        assert_eq!(slice_field("1234", 10, 12), "   ");
        // line ends inside the field
        assert_eq!(slice_field("1234567890A", 10, 12), "0A ");
    }

    #[test]
    fn non_ascii_lines_slice_by_character() {
        assert_eq!(slice_field("ĀBCD", 2, 3), "BC");
        assert_eq!(slice_field("Ā", 2, 3), "  ");
    }

    #[test]
    fn whitespace_only_line_is_skipped() {
        let r = SchemaRegistry::from_json(
            r#"{"a": {"default": {"type": "integer", "start": 1, "end": 3}, "2000": {}}}"#,
        )
        .unwrap();
        let schema = r.year(2000);
        assert!(decode_line("   \t ", &schema, CoercePolicy::Strict)
            .unwrap()
            .is_none());
        assert!(decode_line(" 42", &schema, CoercePolicy::Strict)
            .unwrap()
            .is_some());
    }

    #[test]
    fn crlf_terminator_does_not_reach_the_last_field() {
        let r = SchemaRegistry::from_json(
            r#"{"a": {"default": {"type": "character", "start": 1, "end": 3}, "2000": {}}}"#,
        )
        .unwrap();
        let schema = r.year(2000);
        let rec = decode_line("AB\r", &schema, CoercePolicy::Strict)
            .unwrap()
            .unwrap();
        assert_eq!(rec.values[0], FieldValue::Text("AB ".into()));
    }
}
