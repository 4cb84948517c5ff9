// src/schema/types.rs

use std::sync::Arc;

/// The closed set of field types the dictionary may declare. An unknown tag
/// is rejected when the dictionary is loaded, so decoding can match on this
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Numeric,
    Logical,
    Character,
    /// Declared but not applicable for this year; always decodes to missing.
    Na,
}

impl ColumnType {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "integer" => Some(Self::Integer),
            "numeric" => Some(Self::Numeric),
            "logical" => Some(Self::Logical),
            "character" => Some(Self::Character),
            "na" => Some(Self::Na),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Numeric => "numeric",
            Self::Logical => "logical",
            Self::Character => "character",
            Self::Na => "na",
        }
    }
}

/// One fully resolved column for one year: type, 1-indexed inclusive
/// position range, and optional categorical/NA metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    /// First column of the field, 1-indexed.
    pub start: usize,
    /// Last column of the field, inclusive. Always >= `start`.
    pub end: usize,
    /// Raw codes, paired with `labels` entry by entry.
    pub levels: Option<Vec<String>>,
    pub labels: Option<Vec<String>>,
    /// Whether the categorical has a meaningful ordering downstream. Does
    /// not affect decoding.
    pub ordered: bool,
    /// Raw sentinel meaning "not applicable", distinct from a blank slice.
    pub na_value: Option<String>,
}

impl ColumnDef {
    pub fn width(&self) -> usize {
        self.end - self.start + 1
    }
}

/// The resolved column layout for one year. Column order is dictionary
/// order and is also the output column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearSchema {
    columns: Vec<ColumnDef>,
}

impl YearSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_round_trip() {
        for tag in ["integer", "numeric", "logical", "character", "na"] {
            let ty = ColumnType::parse(tag).unwrap();
            assert_eq!(ty.as_str(), tag);
        }
        assert!(ColumnType::parse("float").is_none());
    }

    #[test]
    fn width_is_inclusive() {
        let col = ColumnDef {
            name: "dob_yy".into(),
            ty: ColumnType::Integer,
            start: 1,
            end: 4,
            levels: None,
            labels: None,
            ordered: false,
            na_value: None,
        };
        assert_eq!(col.width(), 4);
    }
}
