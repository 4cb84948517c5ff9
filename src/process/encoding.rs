// src/process/encoding.rs
//
// The published extracts are nominally ASCII but several years carry
// Windows-1252 bytes in name fields. Decoding is UTF-8 first, falling back
// to Windows-1252 for the whole file, never per line: mixing encodings
// inside one file would silently corrupt values.

use encoding_rs::WINDOWS_1252;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    str,
    sync::atomic::Ordering,
};
use tracing::warn;

use crate::error::StageError;
use crate::process::CancelFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Windows1252,
}

impl TextEncoding {
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Windows1252 => "Windows-1252",
        }
    }
}

/// Result of the counting pass: physical and non-blank line totals, plus
/// the encoding the decode pass must use for the whole file.
#[derive(Debug, Clone, Copy)]
pub struct SourceScan {
    pub total_lines: u64,
    pub data_lines: u64,
    pub encoding: TextEncoding,
}

/// Stream the file once without decoding rows: count lines, count blank
/// lines, and settle the file-level encoding. UTF-8 validity can be checked
/// line by line because the terminator is ASCII, so one bad line anywhere
/// demotes the whole file to the fallback.
pub fn scan(path: &Path, cancel: &CancelFlag) -> Result<SourceScan, StageError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    let mut total = 0u64;
    let mut blank = 0u64;
    let mut utf8_ok = true;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(StageError::Cancelled);
        }
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        total += 1;
        if buf.iter().all(u8::is_ascii_whitespace) {
            blank += 1;
        }
        if utf8_ok && str::from_utf8(&buf).is_err() {
            warn!(
                path = %path.display(),
                line = total,
                "not valid UTF-8, whole file will be read as Windows-1252"
            );
            utf8_ok = false;
        }
    }

    Ok(SourceScan {
        total_lines: total,
        data_lines: total - blank,
        encoding: if utf8_ok {
            TextEncoding::Utf8
        } else {
            TextEncoding::Windows1252
        },
    })
}

/// Streaming line reader that decodes under one fixed encoding. Yields
/// lines without their terminator; the trailing `\r` of CRLF input is left
/// for the decoder to strip so the raw slice stays byte-faithful.
pub struct LineReader {
    reader: BufReader<File>,
    encoding: TextEncoding,
    path: PathBuf,
    buf: Vec<u8>,
}

impl LineReader {
    pub fn open(path: &Path, encoding: TextEncoding) -> Result<Self, StageError> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            encoding,
            path: path.to_path_buf(),
            buf: Vec::new(),
        })
    }

    pub fn next_line(&mut self) -> Result<Option<String>, StageError> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }

        let decode_failed = || StageError::Encoding {
            path: self.path.clone(),
            primary: TextEncoding::Utf8.label(),
            fallback: TextEncoding::Windows1252.label(),
        };

        match self.encoding {
            TextEncoding::Utf8 => match str::from_utf8(&self.buf) {
                Ok(s) => Ok(Some(s.to_string())),
                Err(_) => Err(decode_failed()),
            },
            TextEncoding::Windows1252 => {
                let (text, _, had_errors) = WINDOWS_1252.decode(&self.buf);
                if had_errors {
                    return Err(decode_failed());
                }
                Ok(Some(text.into_owned()))
            }
        }
    }
}
