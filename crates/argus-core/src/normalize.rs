//! Field normalization: dates, geographic names, bounded numeric scales.
//!
//! Every function here is pure and total for string input — unparsable
//! values degrade to the sentinel (plus a log entry), never to a panic.

use chrono::{Datelike, NaiveDate};

use crate::record::{CampaignStatus, FieldKey, Record};

/// Canonical date rendering used across the whole pipeline.
pub const CANONICAL_DATE_FORMAT: &str = "%d-%m-%Y";

/// Accepted input formats, tried in order; the first that parses wins.
const DATE_FORMATS: &[&str] = &[
    "%d.%m.%Y",   // 24.03.2018
    "%B %d, %Y",  // March 24, 2018
    "%b. %d, %Y", // Mar. 24, 2018
    "%d %B %Y",   // 24 March 2018
    "%d %b %Y",   // 24 Mar 2018
    "%Y-%m-%d",   // 2018-03-24
    "%d-%m-%Y",   // already canonical
];

/// Day/month-only formats accepted by the year-inferring variant.
const PARTIAL_DATE_FORMATS: &[&str] = &["%d.%m", "%d %B", "%d %b", "%B %d", "%b %d"];

/// Token spellings that mean "no country given" across sources.
pub const DEFAULT_UNSPECIFIED: &[&str] = &["unspecified", "unknown", "worldwide", "n/a"];

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Try `formats` in order; the first one that parses wins.
fn parse_with_formats(raw: &str, formats: &[&str]) -> Option<NaiveDate> {
    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Normalize a raw date string to `%d-%m-%Y`.
///
/// Returns `sentinel` when no accepted format matches.
pub fn normalize_date(raw: &str, sentinel: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == sentinel {
        return sentinel.to_string();
    }

    if let Some(date) = parse_with_formats(trimmed, DATE_FORMATS) {
        return date.format(CANONICAL_DATE_FORMAT).to_string();
    }

    tracing::warn!(raw = trimmed, "Could not parse date");
    sentinel.to_string()
}

/// Like [`normalize_date`], but additionally accepts day/month input with no
/// year, inferring the year from campaign status.
///
/// Business rule inherited from the source data, not an engineering choice:
/// an upcoming campaign's dates may not lie in the past and an ended
/// campaign's dates may not lie in the future, so the missing year is picked
/// on the matching side of `today` (active campaigns keep today's year).
/// Validate with stakeholders before changing.
pub fn normalize_partial_date(
    raw: &str,
    status: CampaignStatus,
    today: NaiveDate,
    sentinel: &str,
) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == sentinel {
        return sentinel.to_string();
    }

    if let Some(date) = parse_with_formats(trimmed, DATE_FORMATS) {
        return date.format(CANONICAL_DATE_FORMAT).to_string();
    }

    let candidate = format!("{trimmed} {}", today.year());
    for format in PARTIAL_DATE_FORMATS {
        let with_year = format!("{format} %Y");
        if let Ok(date) = NaiveDate::parse_from_str(&candidate, &with_year) {
            return infer_year(date, status, today)
                .format(CANONICAL_DATE_FORMAT)
                .to_string();
        }
    }

    tracing::warn!(raw = trimmed, "Could not parse date");
    sentinel.to_string()
}

/// Shift a year-guessed date to the side of `today` its status demands.
fn infer_year(date: NaiveDate, status: CampaignStatus, today: NaiveDate) -> NaiveDate {
    let shifted = match status {
        CampaignStatus::Upcoming if date < today => date.with_year(today.year() + 1),
        CampaignStatus::Ended if date > today => date.with_year(today.year() - 1),
        _ => return date,
    };
    // Feb 29 may not exist in the shifted year; keep the unshifted guess then.
    shifted.unwrap_or(date)
}

// ---------------------------------------------------------------------------
// Countries
// ---------------------------------------------------------------------------

/// Colloquial spellings resolved before the ISO database lookup.
const NAME_OVERRIDES: &[(&str, &str)] = &[
    ("uk", "UnitedKingdom"),
    ("england", "UnitedKingdom"),
    ("russia", "Russia"),
    ("south korea", "SouthKorea"),
    ("vietnam", "Vietnam"),
];

/// Normalize a comma-separated country list to ISO alpha-3 codes.
///
/// Per token: already alpha-3 (length 3) passes through uppercased, then the
/// override table, then the ISO 3166 database (official names, aliases and
/// alpha-2). Unresolvable tokens are kept verbatim or replaced by `sentinel`
/// depending on `keep_unconverted`; every one of them is logged.
pub fn normalize_countries(
    raw: &str,
    field: FieldKey,
    keep_unconverted: bool,
    unspecified: &[&str],
    sentinel: &str,
) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == sentinel {
        return sentinel.to_string();
    }

    let resolved: Vec<String> = trimmed
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| resolve_country(token, field, keep_unconverted, unspecified, sentinel))
        .collect();

    if resolved.is_empty() {
        return sentinel.to_string();
    }
    resolved.join(", ")
}

fn resolve_country(
    token: &str,
    field: FieldKey,
    keep_unconverted: bool,
    unspecified: &[&str],
    sentinel: &str,
) -> String {
    let lower = token.to_lowercase();

    if unspecified.iter().any(|word| *word == lower) {
        return sentinel.to_string();
    }

    if token.len() == 3 && token.chars().all(|c| c.is_ascii_alphabetic()) {
        return token.to_uppercase();
    }

    let name = NAME_OVERRIDES
        .iter()
        .find(|(from, _)| *from == lower)
        .map(|(_, to)| *to)
        .unwrap_or(token);

    // The ISO database matches names without interior whitespace, so retry
    // squashed when the verbatim spelling misses ("United Kingdom").
    let squashed: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    match name
        .parse::<celes::Country>()
        .or_else(|_| squashed.parse::<celes::Country>())
    {
        Ok(country) => country.alpha3.to_uppercase(),
        Err(_) => {
            tracing::warn!(%field, token, "Could not resolve country to alpha-3");
            if keep_unconverted {
                token.to_string()
            } else {
                sentinel.to_string()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scales
// ---------------------------------------------------------------------------

/// Map `score` from `current = [a, b]` onto `desired = [a', b']` linearly.
///
/// Formats as an integer, or to one decimal place when `decimal` is set.
/// Non-numeric input (including the sentinel) yields `default`.
pub fn convert_scale(
    score: &str,
    current: (f64, f64),
    desired: (f64, f64),
    decimal: bool,
    default: &str,
) -> String {
    let Ok(value) = score.trim().parse::<f64>() else {
        return default.to_string();
    };

    let (a, b) = current;
    let (a2, b2) = desired;
    if (b - a).abs() < f64::EPSILON {
        tracing::warn!(score, ?current, "Degenerate scale range");
        return default.to_string();
    }

    let scaled = a2 + (value - a) * (b2 - a2) / (b - a);
    if decimal {
        format!("{scaled:.1}")
    } else {
        format!("{}", scaled.round() as i64)
    }
}

// ---------------------------------------------------------------------------
// Record application
// ---------------------------------------------------------------------------

/// Normalize a record's date and country fields in place.
///
/// Score scaling is not applied here: each adapter converts its native score
/// range at extraction time, where the range is known.
pub fn normalize_record(record: &mut Record, today: NaiveDate, sentinel: &str) {
    let status = record.status();

    for &key in FieldKey::DATE_KEYS {
        let raw = record.get(key).to_string();
        if raw == sentinel {
            continue;
        }
        let normalized = match status {
            Some(status) => normalize_partial_date(&raw, status, today, sentinel),
            None => normalize_date(&raw, sentinel),
        };
        record.set(key, normalized);
    }

    for &key in FieldKey::COUNTRY_KEYS {
        let raw = record.get(key).to_string();
        if raw == sentinel {
            continue;
        }
        let normalized = normalize_countries(&raw, key, true, DEFAULT_UNSPECIFIED, sentinel);
        record.set(key, normalized);
    }
}
