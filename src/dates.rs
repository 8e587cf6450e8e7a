//! Date helpers. The API speaks `DD/MM/YYYY`; date inputs and logs use
//! `YYYY-MM-DD`.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::error::{AppError, Result};

pub const LOCAL_FORMAT: &str = "%d/%m/%Y";
pub const ISO_FORMAT: &str = "%Y-%m-%d";

/// chrono accepts `3` for `%m`; both forms here are zero-padded, ten characters.
fn fixed_width(s: &str, sep: u8, sep_at: [usize; 2]) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| if sep_at.contains(&i) { *b == sep } else { b.is_ascii_digit() })
}

pub fn parse_local(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if !fixed_width(s, b'/', [2, 5]) {
        return Err(AppError::InvalidDate(format!("{s:?} is not DD/MM/YYYY")));
    }
    NaiveDate::parse_from_str(s, LOCAL_FORMAT)
        .map_err(|_| AppError::InvalidDate(format!("{s:?} is not DD/MM/YYYY")))
}

pub fn parse_iso(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if !fixed_width(s, b'-', [4, 7]) {
        return Err(AppError::InvalidDate(format!("{s:?} is not YYYY-MM-DD")));
    }
    NaiveDate::parse_from_str(s, ISO_FORMAT)
        .map_err(|_| AppError::InvalidDate(format!("{s:?} is not YYYY-MM-DD")))
}

/// Accepts either form, used for command-line input.
pub fn parse_any(s: &str) -> Result<NaiveDate> {
    if s.contains('/') {
        parse_local(s)
    } else {
        parse_iso(s)
    }
}

pub fn format_local(date: NaiveDate) -> String {
    date.format(LOCAL_FORMAT).to_string()
}

pub fn format_iso(date: NaiveDate) -> String {
    date.format(ISO_FORMAT).to_string()
}

/// `2024-03-07` → `07/03/2024`.
pub fn iso_to_local(iso: &str) -> Result<String> {
    parse_iso(iso).map(format_local)
}

/// `07/03/2024` → `2024-03-07`.
pub fn local_to_iso(local: &str) -> Result<String> {
    parse_local(local).map(format_iso)
}

/// Serde adapter for wire dates in `DD/MM/YYYY`.
pub fn deserialize_local<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveDate::parse_from_str(raw.trim(), LOCAL_FORMAT).map_err(serde::de::Error::custom)
}
