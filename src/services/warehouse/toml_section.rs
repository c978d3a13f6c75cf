// Reader for `[connections.<name>]` sections of the Snowflake CLI config file.
//
// Only flat `key = value` pairs are understood. Anything else is skipped so a
// half-edited file never prevents the service from starting.
use std::collections::HashMap;

/// Extract the key/value pairs of `[connections.<connection_name>]`
///
/// Returns an empty map when the section is missing. Lines that are not a
/// simple `key = value` pair are ignored.
pub fn parse_connection_section(content: &str, connection_name: &str) -> HashMap<String, String> {
    let header = format!("[connections.{}]", connection_name);
    let mut values = HashMap::new();

    let Some(start) = content.find(&header) else {
        return values;
    };

    let section = &content[start + header.len()..];
    for (idx, line) in section.lines().enumerate() {
        if idx > 0 && line.trim_start().starts_with('[') {
            break;
        }
        if let Some((key, value)) = parse_pair(line) {
            values.insert(key, value);
        }
    }

    values
}

fn parse_pair(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;

    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    let value = value.trim();
    let value = value.strip_prefix('"').unwrap_or(value);
    let value = value.strip_suffix('"').unwrap_or(value).trim();
    if value.is_empty() {
        return None;
    }

    Some((key.to_string(), value.to_string()))
}
