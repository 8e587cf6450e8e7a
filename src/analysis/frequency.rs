use std::cmp::Ordering;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::catalog;
use crate::config::MAX_TOP_N;
use crate::types::{AnimalCode, Direction, FrequencyEntry};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Reference animal → follow-up entries ranked by the backend, in the order the
/// keys appeared on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable(pub Vec<(AnimalCode, Vec<FrequencyEntry>)>);

impl FrequencyTable {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FrequencyTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = FrequencyTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of animal code to ranked frequency entries")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut rows = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((code, entries)) = map.next_entry::<AnimalCode, Vec<FrequencyEntry>>()? {
                    rows.push((code, entries));
                }
                Ok(FrequencyTable(rows))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FrequencyReport {
    #[serde(rename = "frecuencias", default)]
    pub frequencies: FrequencyTable,
    #[serde(rename = "total_dias", default)]
    pub total_days: u32,
    #[serde(rename = "tipo")]
    pub direction: Option<Direction>,
}

// ---------------------------------------------------------------------------
// Column count
// ---------------------------------------------------------------------------

/// Number of ranked columns per row, always within `1..=MAX_TOP_N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopN(usize);

impl TopN {
    pub fn new(requested: i64) -> Self {
        Self(requested.clamp(1, MAX_TOP_N as i64) as usize)
    }

    /// Parses the leading integer of `text`; missing or non-numeric input
    /// falls back to `MAX_TOP_N`.
    pub fn parse(text: &str) -> Self {
        match leading_integer(text) {
            Some(n) => Self::new(n),
            None => Self(MAX_TOP_N),
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for TopN {
    fn default() -> Self {
        Self(MAX_TOP_N)
    }
}

fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    // Saturate absurdly long inputs rather than failing; they clamp anyway.
    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(sign * value)
}

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixCell {
    Entry(FrequencyEntry),
    /// Filler so every row has exactly N cells.
    Padding,
}

impl MatrixCell {
    pub fn entry(&self) -> Option<&FrequencyEntry> {
        match self {
            MatrixCell::Entry(e) => Some(e),
            MatrixCell::Padding => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyMatrixRow {
    pub reference_animal: AnimalCode,
    pub reference_name: String,
    pub top_entries: Vec<MatrixCell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyMatrix {
    pub top_n: TopN,
    pub direction: Direction,
    pub rows: Vec<FrequencyMatrixRow>,
}

impl FrequencyMatrix {
    pub fn header_labels(&self) -> Vec<String> {
        header_labels(self.top_n)
    }
}

/// Numeric key value, or None for codes that do not read as a number.
fn numeric_key(code: &str) -> Option<f64> {
    code.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (numeric_key(a), numeric_key(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Build the fixed-width top-N table.
///
/// Rows are ordered by numeric key value with non-numeric keys last; the sort
/// is stable, so ties keep wire order. Entries are taken as ranked by the
/// backend and padded to exactly `top_n` cells.
pub fn build(frequencies: &FrequencyTable, top_n: TopN) -> Vec<FrequencyMatrixRow> {
    let n = top_n.get();
    let mut keyed: Vec<&(AnimalCode, Vec<FrequencyEntry>)> = frequencies.0.iter().collect();
    keyed.sort_by(|a, b| compare_keys(&a.0, &b.0));

    keyed
        .into_iter()
        .map(|(code, entries)| {
            let mut top_entries: Vec<MatrixCell> =
                entries.iter().take(n).cloned().map(MatrixCell::Entry).collect();
            top_entries.resize(n, MatrixCell::Padding);
            FrequencyMatrixRow {
                reference_animal: code.clone(),
                reference_name: catalog::animal_name(code).unwrap_or("").to_string(),
                top_entries,
            }
        })
        .collect()
}

/// 🥇 🥈 🥉 for the podium, `4°`, `5°`, ... after that.
pub fn rank_label(rank: usize) -> String {
    match rank {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        n => format!("{n}°"),
    }
}

pub fn header_labels(top_n: TopN) -> Vec<String> {
    let mut labels = vec!["#".to_string(), "Reference".to_string()];
    for rank in 1..=top_n.get() {
        labels.push(rank_label(rank));
        labels.push("Animal".to_string());
        labels.push("Freq".to_string());
    }
    labels
}
