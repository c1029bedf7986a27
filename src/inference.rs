//! Column storage types and the single-pass type inference over raw values.
//!
//! [`infer_column_type`] walks a column left to right. The first value that is
//! not numeric settles the column as a character type using only the lengths
//! observed up to that point; numeric columns resolve to [`ColumnType::Integer`]
//! or, when any value carries a decimal point, [`ColumnType::Decimal`].

use std::fmt;

use anyhow::{Result, anyhow, ensure};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Width used for short character columns.
pub const VARCHAR_LIMIT: u32 = 255;

/// Precision and scale assigned to inferred decimal columns.
pub const INFERRED_DECIMAL: DecimalSpec = DecimalSpec {
    precision: 10,
    scale: 2,
};

const DECIMAL_MAX_PRECISION: u32 = 38;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalSpec {
    pub precision: u32,
    pub scale: u32,
}

impl DecimalSpec {
    pub fn new(precision: u32, scale: u32) -> Result<Self> {
        let spec = Self { precision, scale };
        spec.ensure_valid()?;
        Ok(spec)
    }

    pub fn ensure_valid(&self) -> Result<()> {
        ensure!(self.precision > 0, "Decimal precision must be positive");
        ensure!(
            self.precision <= DECIMAL_MAX_PRECISION,
            "Decimal precision must be <= {}",
            DECIMAL_MAX_PRECISION
        );
        ensure!(
            self.scale <= self.precision,
            "Decimal scale ({}) cannot exceed precision ({})",
            self.scale,
            self.precision
        );
        Ok(())
    }
}

/// Storage type recorded on a column definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Varchar(u32),
    Decimal(DecimalSpec),
    Integer,
}

impl ColumnType {
    /// SQL-style tag persisted with the column definition.
    pub fn tag(&self) -> String {
        match self {
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Varchar(width) => format!("VARCHAR({width})"),
            ColumnType::Decimal(spec) => format!("DECIMAL({},{})", spec.precision, spec.scale),
            ColumnType::Integer => "INTEGER".to_string(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl std::str::FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(' ', "");
        match normalized.as_str() {
            "TEXT" => Ok(ColumnType::Text),
            "INTEGER" | "INT" => Ok(ColumnType::Integer),
            other => {
                if let Some(args) = parenthesized(other, "VARCHAR") {
                    let width = args
                        .parse::<u32>()
                        .map_err(|_| anyhow!("Invalid VARCHAR width in '{value}'"))?;
                    ensure!(width > 0, "VARCHAR width must be positive");
                    return Ok(ColumnType::Varchar(width));
                }
                if let Some(args) = parenthesized(other, "DECIMAL") {
                    let (precision, scale) = args
                        .split_once(',')
                        .ok_or_else(|| anyhow!("Decimal type '{value}' must list precision,scale"))?;
                    let precision = precision
                        .parse::<u32>()
                        .map_err(|_| anyhow!("Invalid decimal precision in '{value}'"))?;
                    let scale = scale
                        .parse::<u32>()
                        .map_err(|_| anyhow!("Invalid decimal scale in '{value}'"))?;
                    return Ok(ColumnType::Decimal(DecimalSpec::new(precision, scale)?));
                }
                Err(anyhow!(
                    "Unknown column type '{value}'. Supported types: TEXT, VARCHAR(n), DECIMAL(p,s), INTEGER"
                ))
            }
        }
    }
}

fn parenthesized<'a>(value: &'a str, keyword: &str) -> Option<&'a str> {
    value
        .strip_prefix(keyword)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.tag())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(|err: anyhow::Error| de::Error::custom(err.to_string()))
    }
}

/// True when the trimmed value reads as a finite number.
pub fn is_numeric_token(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Infers the storage type of one column from its raw values in row order.
pub fn infer_column_type<I, S>(values: I) -> ColumnType
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen_any = false;
    let mut has_decimal_point = false;
    let mut max_len = 0usize;

    for value in values {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        seen_any = true;
        max_len = max_len.max(trimmed.chars().count());

        if !is_numeric_token(trimmed) {
            return if max_len > VARCHAR_LIMIT as usize {
                ColumnType::Text
            } else {
                ColumnType::Varchar(VARCHAR_LIMIT)
            };
        }
        if trimmed.contains('.') {
            has_decimal_point = true;
        }
    }

    if !seen_any {
        ColumnType::Text
    } else if has_decimal_point {
        ColumnType::Decimal(INFERRED_DECIMAL)
    } else {
        ColumnType::Integer
    }
}
