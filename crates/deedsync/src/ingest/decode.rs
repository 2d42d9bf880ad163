//! Typed decoding of raw extract records
//!
//! Decoding never fails. A field that is absent, empty or malformed comes
//! back as `None`; malformed values are additionally named in
//! [`DocumentRecord::degraded`] so the loader can log them.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::source::{RawRecord, FIELD_SEPARATOR};
use crate::error::LayoutError;

/// Column names used by the loaders
pub mod column {
    pub const PRSERV: &str = "PRSERV";
    pub const BOOK: &str = "Book";
    pub const PAGE: &str = "Page";
    pub const CLERK_NUMBER: &str = "Clerk_Number";
    pub const INSTRUMENT_TYPE: &str = "Instrument_Type";
    pub const ACRES: &str = "Acres";
    pub const ABSTRACT: &str = "Abstract";
    pub const SUB_BLOCK_LOT: &str = "Sub_Block_Lot";
    pub const BRIEF_LEGAL: &str = "Brief_Legal";
    pub const INSTRUMENT_DATE: &str = "Instrument_Date";
    pub const FILING_DATE: &str = "Filing_Date";
    pub const REMARKS: &str = "Remarks";
    pub const INDEXED_BY: &str = "Indexed_By";
    pub const GF_NUMBER: &str = "GF_Number";
    pub const GRANTOR: &str = "Grantor";
    pub const GRANTEE: &str = "Grantee";
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column name to field position, built once per extract from its header row
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    positions: HashMap<String, usize>,
}

impl ColumnMap {
    /// Later duplicates of a column name win.
    pub fn from_header(header: &str) -> Self {
        let positions = header
            .split(FIELD_SEPARATOR)
            .enumerate()
            .map(|(index, name)| (name.trim().to_string(), index))
            .collect();
        Self { positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<usize, LayoutError> {
        self.position(name).ok_or_else(|| LayoutError::MissingColumn {
            column: name.to_string(),
        })
    }

    fn row<'a>(&'a self, record: &'a RawRecord) -> Row<'a> {
        Row {
            fields: record.fields().collect(),
            columns: self,
        }
    }
}

/// Fields of one record addressed by column name
struct Row<'a> {
    fields: Vec<&'a str>,
    columns: &'a ColumnMap,
}

impl<'a> Row<'a> {
    /// Raw field; `None` when the column is unknown or the record is short
    fn get(&self, name: &str) -> Option<&'a str> {
        self.columns
            .position(name)
            .and_then(|index| self.fields.get(index).copied())
    }

    fn text(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    /// Trimmed, `None` when blank
    fn key(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// Parse the first whitespace-separated token as `YYYY-MM-DD`.
///
/// Blank input is `Ok(None)`; a time of day after the date is ignored.
pub fn parse_date(raw: &str) -> Result<Option<NaiveDate>, chrono::ParseError> {
    match raw.split_whitespace().next() {
        Some(token) => NaiveDate::parse_from_str(token, DATE_FORMAT).map(Some),
        None => Ok(None),
    }
}

/// Parse a trimmed number; blank input is `Ok(None)`.
pub fn parse_number<T: FromStr>(raw: &str) -> Result<Option<T>, T::Err> {
    let raw = raw.trim();
    if raw.is_empty() {
        Ok(None)
    } else {
        raw.parse().map(Some)
    }
}

/// A header row: one recorded instrument
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub prserv: Option<String>,
    pub book: Option<String>,
    pub page: Option<String>,
    pub clerk_number: Option<String>,
    pub instrument_type: Option<String>,
    pub acres: Option<f64>,
    /// As found in the extract; checked against the lookup table at load time
    pub abstract_code: Option<String>,
    pub sub_block: Option<String>,
    pub legal_description: Option<String>,
    pub file_stamp_date: Option<NaiveDate>,
    pub filing_date: Option<NaiveDate>,
    pub remarks: Option<String>,
    pub finalized_by: Option<String>,
    pub gf_number: Option<i64>,
    /// Columns whose value was present but malformed
    pub degraded: Vec<&'static str>,
}

fn lenient<T, E>(
    value: Option<&str>,
    column: &'static str,
    parse: impl FnOnce(&str) -> Result<Option<T>, E>,
    degraded: &mut Vec<&'static str>,
) -> Option<T> {
    match value.map(parse) {
        Some(Ok(parsed)) => parsed,
        Some(Err(_)) => {
            degraded.push(column);
            None
        },
        None => None,
    }
}

pub fn decode_document(record: &RawRecord, columns: &ColumnMap) -> DocumentRecord {
    let row = columns.row(record);
    let mut degraded = Vec::new();

    let acres = lenient(row.get(column::ACRES), column::ACRES, parse_number::<f64>, &mut degraded);
    let file_stamp_date = lenient(
        row.get(column::INSTRUMENT_DATE),
        column::INSTRUMENT_DATE,
        parse_date,
        &mut degraded,
    );
    let filing_date = lenient(
        row.get(column::FILING_DATE),
        column::FILING_DATE,
        parse_date,
        &mut degraded,
    );
    let gf_number = lenient(
        row.get(column::GF_NUMBER),
        column::GF_NUMBER,
        parse_number::<i64>,
        &mut degraded,
    );

    DocumentRecord {
        prserv: row.key(column::PRSERV),
        book: row.text(column::BOOK),
        page: row.text(column::PAGE),
        clerk_number: row.text(column::CLERK_NUMBER),
        instrument_type: row.text(column::INSTRUMENT_TYPE),
        acres,
        abstract_code: row.text(column::ABSTRACT),
        sub_block: row.text(column::SUB_BLOCK_LOT),
        legal_description: row.text(column::BRIEF_LEGAL),
        file_stamp_date,
        filing_date,
        remarks: row.text(column::REMARKS),
        finalized_by: row.text(column::INDEXED_BY),
        gf_number,
        degraded,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PartyRole {
    Grantor,
    Grantee,
}

impl PartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyRole::Grantor => "Grantor",
            PartyRole::Grantee => "Grantee",
        }
    }
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A party row to be written under its document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Party {
    pub name: String,
    pub role: PartyRole,
}

/// A detail row: the grantor and grantee of one instrument
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartyRecord {
    pub prserv: Option<String>,
    pub grantor: Option<String>,
    pub grantee: Option<String>,
}

impl PartyRecord {
    /// Party rows to insert, grantor first
    pub fn parties(&self) -> Vec<Party> {
        [
            (PartyRole::Grantor, &self.grantor),
            (PartyRole::Grantee, &self.grantee),
        ]
        .into_iter()
        .filter_map(|(role, name)| {
            name.as_ref().map(|name| Party {
                name: name.clone(),
                role,
            })
        })
        .collect()
    }
}

pub fn decode_party(record: &RawRecord, columns: &ColumnMap) -> PartyRecord {
    let row = columns.row(record);
    PartyRecord {
        prserv: row.key(column::PRSERV),
        grantor: row.key(column::GRANTOR),
        grantee: row.key(column::GRANTEE),
    }
}
