// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Import Parsers
//!
//! Turns inbound host batches into raw records for the business key-mapper:
//!
//! - delimited text with a header row (delimiter configurable, UTF-8 BOM
//!   tolerated, blank cells skipped)
//! - CMDB query results: a JSON array of flat instance maps
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Wire-level parsing only; no mapping or validation of business fields

use std::path::Path;

use thiserror::Error;

use crate::domain::business::RawRecord;

/// UTF-8 BOM bytes
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Import file is empty")]
    Empty,

    #[error("Delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(char),

    #[error("Malformed delimited input at line {line}: {reason}")]
    Delimited { line: u64, reason: String },

    #[error("Malformed CMDB result: {0}")]
    Json(String),

    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Source format of an import file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Delimited,
    CmdbJson,
}

impl ImportFormat {
    /// `.json` files are CMDB results; everything else is delimited text
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ImportFormat::CmdbJson,
            _ => ImportFormat::Delimited,
        }
    }
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

/// Parse delimited text whose first row names the columns.
///
/// Cells that are empty after trimming are left out of the record, so a
/// blank column never overwrites or labels anything.
pub fn parse_delimited(data: &[u8], delimiter: char) -> Result<Vec<RawRecord>, ImportError> {
    if !delimiter.is_ascii() {
        return Err(ImportError::InvalidDelimiter(delimiter));
    }

    let data = strip_utf8_bom(data);
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(ImportError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter as u8)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ImportError::Delimited {
            line: 1,
            reason: e.to_string(),
        })?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| ImportError::Delimited {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            reason: e.to_string(),
        })?;

        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .filter(|(header, cell)| !header.is_empty() && !cell.is_empty())
            .map(|(header, cell)| (header.clone(), serde_json::Value::String(cell.to_string())))
            .collect();

        if !record.is_empty() {
            records.push(record);
        }
    }

    Ok(records)
}

/// Parse a CMDB query result: a JSON array of flat objects
pub fn parse_cmdb_json(data: &[u8]) -> Result<Vec<RawRecord>, ImportError> {
    let data = strip_utf8_bom(data);
    let value: serde_json::Value =
        serde_json::from_slice(data).map_err(|e| ImportError::Json(e.to_string()))?;

    let serde_json::Value::Array(items) = value else {
        return Err(ImportError::Json("expected a JSON array of instances".to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect::<RawRecord>()),
            other => Err(ImportError::Json(format!(
                "instance {} is not an object: {}",
                index, other
            ))),
        })
        .collect()
}

/// Read and parse an import file, picking the parser from its extension
pub fn parse_file(path: &Path, delimiter: char) -> Result<Vec<RawRecord>, ImportError> {
    let data = std::fs::read(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    match ImportFormat::from_path(path) {
        ImportFormat::Delimited => parse_delimited(&data, delimiter),
        ImportFormat::CmdbJson => parse_cmdb_json(&data),
    }
}
