//! Text query parser
//!
//! Parses search queries with operators like:
//! - `name:"John Smith"` - exact identity
//! - `notes:smith` - notes substring
//! - `message:parcel` - inline message substring
//! - `hash:0d948f` - attachment digest prefix
//! - `after:2024/01/01`, `before:2024-12-31` - creation date range
//! - `near:55.75,37.61,1000` - recipient within 1000 m
//! - `damp:55.75,37.61,5000[,0.05]` - damping distance filter
//!
//! Remaining words are joined and matched against the inline message.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use super::predicate::{MailQuery, Predicate};
use crate::models::Coordinates;

const OPERATORS: [&str; 8] = [
    "name", "notes", "message", "hash", "after", "before", "near", "damp",
];

/// Parse a search query string into a [`MailQuery`]
///
/// Operator values may be quoted. An operator whose value does not parse
/// is kept as a plain word.
pub fn parse_query(input: &str) -> MailQuery {
    let mut query = MailQuery::new();
    let mut terms: Vec<String> = Vec::new();
    let mut after = None;
    let mut before = None;

    let mut i = 0;
    let chars: Vec<char> = input.chars().collect();

    while i < chars.len() {
        // Skip whitespace
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        let rest: String = chars[i..].iter().collect();

        if let Some((key, value, consumed)) = parse_operator(&rest) {
            let accepted = match key.as_str() {
                "after" => parse_date(&value).map(|d| after = Some(d)).is_some(),
                "before" => parse_date(&value).map(|d| before = Some(d)).is_some(),
                _ => match operator_predicate(&key, &value) {
                    Some(predicate) => {
                        query.push(predicate);
                        true
                    }
                    None => false,
                },
            };
            if !accepted {
                terms.push(format!("{key}:{value}"));
            }
            i += consumed;
        } else {
            let (word, consumed) = parse_word(&rest);
            if !word.is_empty() {
                terms.push(word);
            }
            i += consumed;
        }
    }

    if after.is_some() || before.is_some() {
        query.push(Predicate::date_range(after, before));
    }
    if !terms.is_empty() {
        query.push(Predicate::InlineMessageContains(terms.join(" ")));
    }

    query
}

/// Predicate for a non-date operator, `None` if the value is malformed
fn operator_predicate(key: &str, value: &str) -> Option<Predicate> {
    match key {
        "name" => Some(Predicate::NameEquals(value.to_string())),
        "notes" => Some(Predicate::NotesContains(value.to_string())),
        "message" => Some(Predicate::InlineMessageContains(value.to_string())),
        "hash" => Some(Predicate::AttachmentHashPrefix(value.to_lowercase())),
        "near" => parse_near(value),
        "damp" => parse_damp(value),
        _ => None,
    }
}

/// Parse an operator like "name:value" or "name:\"quoted value\""
fn parse_operator(input: &str) -> Option<(String, String, usize)> {
    let colon_pos = input.find(':')?;
    let key = &input[..colon_pos];

    // Key must not contain whitespace
    if key.chars().any(|c| c.is_whitespace()) {
        return None;
    }

    let key = key.to_lowercase();
    if !OPERATORS.contains(&key.as_str()) {
        return None;
    }

    let after_colon = &input[colon_pos + 1..];
    let (value, value_len) = parse_value(after_colon);

    // Don't match if value is empty
    if value.is_empty() {
        return None;
    }

    Some((key, value, colon_pos + 1 + value_len))
}

/// Parse a value (quoted or unquoted)
fn parse_value(input: &str) -> (String, usize) {
    parse_word(input)
}

/// Parse a word or quoted phrase, returning it and the chars consumed
fn parse_word(input: &str) -> (String, usize) {
    let chars: Vec<char> = input.chars().collect();

    if chars.is_empty() {
        return (String::new(), 0);
    }

    // Quoted phrase
    if chars[0] == '"' {
        let mut word = String::new();
        let mut i = 1;
        while i < chars.len() && chars[i] != '"' {
            word.push(chars[i]);
            i += 1;
        }
        let consumed = if i < chars.len() { i + 1 } else { i };
        return (word, consumed);
    }

    // Unquoted word
    let mut word = String::new();
    let mut i = 0;
    while i < chars.len() && !chars[i].is_whitespace() {
        word.push(chars[i]);
        i += 1;
    }

    (word, i)
}

/// Parse comma-separated floats
fn parse_numbers(input: &str) -> Option<Vec<f64>> {
    input
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect()
}

fn parse_center(lat: f64, lon: f64) -> Option<Coordinates> {
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Some(Coordinates::new(lat, lon))
    } else {
        None
    }
}

/// `LAT,LON,RADIUS_M`
fn parse_near(input: &str) -> Option<Predicate> {
    match parse_numbers(input)?.as_slice() {
        [lat, lon, radius] if *radius >= 0.0 => {
            Some(Predicate::within_radius(parse_center(*lat, *lon)?, *radius))
        }
        _ => None,
    }
}

/// `LAT,LON,BASE_M` or `LAT,LON,BASE_M,THRESHOLD`
fn parse_damp(input: &str) -> Option<Predicate> {
    match parse_numbers(input)?.as_slice() {
        [lat, lon, base] if *base > 0.0 => {
            Some(Predicate::damping(parse_center(*lat, *lon)?, *base))
        }
        [lat, lon, base, threshold] if *base > 0.0 && (0.0..=1.0).contains(threshold) => {
            Some(Predicate::DampingDistance {
                center: parse_center(*lat, *lon)?,
                base_distance_meters: *base,
                threshold_probability: *threshold,
            })
        }
        _ => None,
    }
}

/// Parse a date string (YYYY/MM/DD or YYYY-MM-DD)
fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    ["%Y/%m/%d", "%Y-%m-%d"].iter().find_map(|format| {
        NaiveDate::parse_from_str(input, format)
            .ok()?
            .and_hms_opt(0, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt))
    })
}
