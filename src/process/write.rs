// src/process/write.rs

use std::io::{self, BufWriter, Write};

use crate::process::decode::{DecodedRecord, FieldValue};

/// Sink for staged output: the resolved column names once, then accepted
/// records in the order they were accepted. Serialization format and any
/// compression live behind this boundary.
pub trait RecordWriter {
    fn write_header(&mut self, names: &[&str]) -> io::Result<()>;
    fn write_record(&mut self, record: &DecodedRecord) -> io::Result<()>;
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Comma-delimited writer matching the published staging format: character
/// fields always quoted, numerics with exactly one decimal digit, missing
/// values as empty fields. Quoting is per-field by type, which rules out a
/// generic CSV writer's all-or-nothing quote styles.
pub struct CsvRecordWriter<W: Write> {
    out: BufWriter<W>,
    line: String,
}

impl<W: Write> CsvRecordWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
            line: String::new(),
        }
    }

    fn push_field(line: &mut String, value: &FieldValue) {
        use std::fmt::Write as _;
        match value {
            FieldValue::Missing => {}
            FieldValue::Integer(v) => {
                let _ = write!(line, "{v}");
            }
            FieldValue::Numeric(v) => {
                let _ = write!(line, "{v:.1}");
            }
            FieldValue::Logical(s) => line.push_str(s),
            FieldValue::Text(s) => {
                line.push('"');
                for c in s.chars() {
                    if c == '"' {
                        line.push('"');
                    }
                    line.push(c);
                }
                line.push('"');
            }
        }
    }
}

impl<W: Write> RecordWriter for CsvRecordWriter<W> {
    fn write_header(&mut self, names: &[&str]) -> io::Result<()> {
        writeln!(self.out, "{}", names.join(","))
    }

    fn write_record(&mut self, record: &DecodedRecord) -> io::Result<()> {
        self.line.clear();
        for (i, value) in record.values.iter().enumerate() {
            if i > 0 {
                self.line.push(',');
            }
            Self::push_field(&mut self.line, value);
        }
        writeln!(self.out, "{}", self.line)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
