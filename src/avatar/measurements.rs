/// Avatar body measurements
///
/// The measurements file is a semicolon-separated table in ISO-8859-1.
/// Each line is one attribute (gender, height, chest, ...) and each column
/// after the leading label is one avatar. Parsing turns the table around
/// into one vector per avatar, ready to be compared against a user profile.

use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, TryOnError};

/// One cell of the table. Cells that parse as integers become numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Measurement {
    Int(i64),
    Text(String),
}

impl Measurement {
    fn coerce(cell: &str) -> Self {
        let cell = cell.trim();
        match cell.parse::<i64>() {
            Ok(value) => Measurement::Int(value),
            Err(_) => Measurement::Text(cell.to_string()),
        }
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Measurement::Int(value) => write!(f, "{}", value),
            Measurement::Text(text) => f.write_str(text),
        }
    }
}

/// All measurements of one avatar, top to bottom
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvatarColumn {
    /// e.g. "Women_S", from the first two cells
    pub name: String,
    pub values: Vec<Measurement>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct AvatarTable {
    pub columns: Vec<AvatarColumn>,
}

impl AvatarTable {
    /// Read and parse a measurements file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| TryOnError::io(format!("Failed to read {}", path.display()), e))?;
        let table = Self::parse(&decode_latin1(&bytes))?;

        log::info!(
            "🧍 Loaded {} avatars from {}",
            table.columns.len(),
            path.display()
        );
        Ok(table)
    }

    /// Transpose semicolon-separated rows into per-avatar columns.
    ///
    /// The first field of every row is a label and is dropped. The column
    /// count comes from the first row; a row with fewer cells is rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rows: Vec<(usize, Vec<&str>)> = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.split(';').skip(1).collect();
            rows.push((index + 1, cells));
        }

        let width = match rows.first() {
            Some((_, cells)) => cells.len(),
            None => return Ok(Self::default()),
        };

        for (line_no, cells) in &rows {
            if cells.len() < width {
                return Err(TryOnError::InvalidInput(format!(
                    "measurements line {} has {} avatar columns, expected {}",
                    line_no,
                    cells.len(),
                    width
                )));
            }
        }

        let columns = (0..width)
            .map(|i| {
                let values: Vec<Measurement> = rows
                    .iter()
                    .map(|(_, cells)| Measurement::coerce(cells[i]))
                    .collect();
                AvatarColumn {
                    name: column_name(&values),
                    values,
                }
            })
            .collect();

        Ok(Self { columns })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TryOnError::InvalidInput(format!("Failed to encode avatars: {}", e)))
    }
}

fn column_name(values: &[Measurement]) -> String {
    match values {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second, ..] => format!("{}_{}", first, second),
    }
}

/// ISO-8859-1 maps every byte straight onto the same Unicode code point
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
