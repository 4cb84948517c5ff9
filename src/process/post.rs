// src/process/post.rs

use crate::process::decode::FieldValue;
use crate::schema::ColumnDef;

/// Post-processing driven by the column definition, applied to the raw
/// slice before type coercion. Returns `Some` when the column's metadata
/// fully determines the value:
///
/// - a slice equal to the column's `na_value` sentinel becomes missing;
/// - for a categorical column the code is mapped through levels → labels,
///   and a code absent from `levels` becomes missing, never an error.
///
/// Comparison uses the trimmed slice, since fixed-width fields are padded
/// but the dictionary records bare codes.
pub fn apply(col: &ColumnDef, raw: &str) -> Option<FieldValue> {
    let code = raw.trim();

    if let Some(na) = &col.na_value {
        if code == na {
            return Some(FieldValue::Missing);
        }
    }

    if let Some(levels) = &col.levels {
        // The registry rejects levels without labels at load time.
        let labels = col.labels.as_ref()?;
        return Some(match levels.iter().position(|l| l == code) {
            Some(i) => FieldValue::Text(labels[i].clone()),
            None => FieldValue::Missing,
        });
    }

    None
}
