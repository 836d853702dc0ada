// src/duration.rs

//! Go-style duration strings
//!
//! Sources carry their poll interval as a Go duration (`"10m"`, `"1h30m"`,
//! `"1.5s"`), and the controller configuration file uses the same grammar.

use crate::error::{Error, Result};
use std::time::Duration;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3600 * NANOS_PER_SECOND),
        _ => None,
    }
}

/// Parse a duration such as `"300ms"`, `"-1.5h"` or `"2h45m"`
///
/// Accepts a sequence of decimal numbers, each with an optional fraction and
/// a unit suffix (`ns`, `us`, `ms`, `s`, `m`, `h`). A bare `"0"` is allowed.
/// Negative durations parse successfully and clamp to zero, which callers
/// treat the same as "no interval".
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || Error::ConfigError(format!("time: invalid duration {input:?}"));

    let mut s = input;
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !s.is_empty() {
        let int_len = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (int_part, rest) = s.split_at(int_len);

        let (frac_part, rest) = match rest.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(frac_len)
            }
            None => ("", rest),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (unit, rest) = rest.split_at(unit_len);
        if unit.is_empty() {
            return Err(Error::ConfigError(format!(
                "time: missing unit in duration {input:?}"
            )));
        }
        let scale = unit_nanos(unit).ok_or_else(|| {
            Error::ConfigError(format!("time: unknown unit {unit:?} in duration {input:?}"))
        })?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let mut value = whole.checked_mul(scale).ok_or_else(invalid)?;

        if !frac_part.is_empty() {
            // Digits beyond nanosecond precision of the largest unit carry no weight
            let digits = &frac_part[..frac_part.len().min(18)];
            let frac: u128 = digits.parse().map_err(|_| invalid())?;
            value += frac * scale / 10u128.pow(digits.len() as u32);
        }

        total = total.checked_add(value).ok_or_else(invalid)?;
        s = rest;
    }

    if total > i64::MAX as u128 {
        return Err(invalid());
    }
    if negative {
        return Ok(Duration::ZERO);
    }
    Ok(Duration::from_nanos(total as u64))
}

/// Parse an optional duration field: empty means "not configured"
///
/// Zero and negative durations also come back as `None`.
pub fn parse_optional_duration(input: &str) -> Result<Option<Duration>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    let duration = parse_duration(input.trim())?;
    Ok((!duration.is_zero()).then_some(duration))
}
