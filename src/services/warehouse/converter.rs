// Snowflake JSON result conversion
//
// Snowflake returns every cell as a string (or null) and describes the real
// type in `rowtype`. Values are converted so callers see numbers as numbers
// and dates as ISO strings.
use super::adapter::Row;
use chrono::{DateTime, FixedOffset, NaiveTime};
use serde::Deserialize;
use serde_json::{Number, Value};

/// Column description from a Snowflake result
#[derive(Debug, Clone, Deserialize)]
pub struct RowType {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub scale: Option<i64>,
}

/// Zip column descriptions with raw rowset cells into named rows
pub fn rows_to_json(columns: &[RowType], rowset: Vec<Vec<Value>>) -> Vec<Row> {
    rowset
        .into_iter()
        .map(|cells| {
            let mut row = Row::new();
            for (idx, column) in columns.iter().enumerate() {
                let value = cells.get(idx).map(|cell| convert_cell(cell, column)).unwrap_or(Value::Null);
                row.insert(column.name.clone(), value);
            }
            row
        })
        .collect()
}

fn convert_cell(cell: &Value, column: &RowType) -> Value {
    let raw = match cell {
        Value::Null => return Value::Null,
        Value::String(s) => s.as_str(),
        // Already typed (some endpoints send JSON natives)
        other => return other.clone(),
    };

    let converted = match column.data_type.to_lowercase().as_str() {
        "fixed" => convert_fixed(raw, column.scale.unwrap_or(0)),
        "real" => raw.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
        "boolean" => match raw {
            "1" | "true" | "TRUE" => Some(Value::Bool(true)),
            "0" | "false" | "FALSE" => Some(Value::Bool(false)),
            _ => None,
        },
        "date" => raw
            .parse::<i64>()
            .ok()
            .and_then(|days| DateTime::from_timestamp(days * 86_400, 0))
            .map(|dt| Value::String(dt.date_naive().format("%Y-%m-%d").to_string())),
        "time" => parse_epoch(raw)
            .and_then(|(secs, nanos)| {
                NaiveTime::from_num_seconds_from_midnight_opt(u32::try_from(secs).ok()?, nanos)
            })
            .map(|t| Value::String(t.format("%H:%M:%S%.f").to_string())),
        "timestamp_ntz" => parse_epoch(raw)
            .and_then(|(secs, nanos)| DateTime::from_timestamp(secs, nanos))
            .map(|dt| Value::String(dt.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "timestamp_ltz" => parse_epoch(raw)
            .and_then(|(secs, nanos)| DateTime::from_timestamp(secs, nanos))
            .map(|dt| Value::String(dt.to_rfc3339())),
        "timestamp_tz" => convert_timestamp_tz(raw),
        "variant" | "object" | "array" => serde_json::from_str(raw).ok(),
        _ => Some(Value::String(raw.to_string())),
    };

    converted.unwrap_or_else(|| {
        tracing::warn!(
            "Could not convert value of column {} ({}), keeping text",
            column.name,
            column.data_type
        );
        Value::String(raw.to_string())
    })
}

fn convert_fixed(raw: &str, scale: i64) -> Option<Value> {
    if scale == 0 {
        if let Ok(v) = raw.parse::<i64>() {
            return Some(Value::Number(Number::from(v)));
        }
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
}

/// Split `"<seconds>.<fraction>"` into whole seconds and nanoseconds
fn parse_epoch(raw: &str) -> Option<(i64, u32)> {
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    let negative = whole.starts_with('-');
    let secs: i64 = whole.parse().ok()?;

    let digits: String = fraction.chars().take(9).collect();
    let nanos: u32 = if digits.is_empty() {
        0
    } else {
        format!("{:0<9}", digits).parse().ok()?
    };

    if negative && nanos > 0 {
        Some((secs - 1, 1_000_000_000 - nanos))
    } else {
        Some((secs, nanos))
    }
}

/// `"<epoch seconds> <offset minutes + 1440>"`
fn convert_timestamp_tz(raw: &str) -> Option<Value> {
    let mut parts = raw.split_whitespace();
    let (secs, nanos) = parse_epoch(parts.next()?)?;
    let utc = DateTime::from_timestamp(secs, nanos)?;

    let rendered = match parts.next().and_then(|o| o.parse::<i32>().ok()) {
        Some(encoded) => {
            let offset = FixedOffset::east_opt((encoded - 1440) * 60)?;
            utc.with_timezone(&offset).to_rfc3339()
        }
        None => utc.to_rfc3339(),
    };
    Some(Value::String(rendered))
}
