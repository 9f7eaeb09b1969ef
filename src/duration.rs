//! Interval string parsing
//!
//! Accepts the compact `<integer><unit>` notation used by `--keep-alive`,
//! `--obsess` and `--how-many`:
//!
//! | Suffix | Unit    | Example           |
//! |--------|---------|-------------------|
//! | `s`    | seconds | `120s` -> 120 s   |
//! | `m`    | minutes | `60m`  -> 3600 s  |
//! | `h`    | hours   | `24h`  -> 86400 s |
//! | `d`    | days    | `7d`   -> 604800 s|
//! | none   | minutes | `5`    -> 300 s   |

use std::time::Duration;
use thiserror::Error;

/// Errors produced while parsing an interval string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("empty interval")]
    Empty,
    #[error("invalid interval '{input}': magnitude must be a non-negative integer")]
    InvalidMagnitude { input: String },
    #[error("invalid interval '{input}': unknown unit '{unit}' (expected s, m, h or d)")]
    UnknownUnit { input: String, unit: char },
    #[error("invalid interval '{input}': value too large")]
    Overflow { input: String },
}

/// Parse an interval string such as `"30s"`, `"5m"`, `"1h"`, `"7d"` or `"5"`.
///
/// A bare integer is a count of minutes.
pub fn parse_duration(text: &str) -> Result<Duration, DurationParseError> {
    let last = text.chars().last().ok_or(DurationParseError::Empty)?;

    let (magnitude, unit_seconds) = if last.is_ascii_digit() {
        (text, 60)
    } else {
        let unit_seconds = match last {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            unit => {
                return Err(DurationParseError::UnknownUnit {
                    input: text.to_string(),
                    unit,
                })
            }
        };
        (&text[..text.len() - last.len_utf8()], unit_seconds)
    };

    // u64::from_str would also take a leading '+'
    if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DurationParseError::InvalidMagnitude {
            input: text.to_string(),
        });
    }

    let overflow = || DurationParseError::Overflow {
        input: text.to_string(),
    };
    let count: u64 = magnitude.parse().map_err(|_| overflow())?;
    let seconds = count.checked_mul(unit_seconds).ok_or_else(overflow)?;

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_unit() {
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("60m").unwrap(), Duration::from_secs(3_600));
        assert_eq!(parse_duration("120s").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn test_bare_integer_is_minutes() {
        assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_zero_with_unit() {
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0m").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_repeated_calls_agree() {
        let first = parse_duration("90s");
        let second = parse_duration("90s");
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(parse_duration(""), Err(DurationParseError::Empty));
    }

    #[test]
    fn test_unknown_unit_rejected() {
        assert_eq!(
            parse_duration("10x"),
            Err(DurationParseError::UnknownUnit {
                input: "10x".to_string(),
                unit: 'x'
            })
        );
        assert!(matches!(
            parse_duration("5M"),
            Err(DurationParseError::UnknownUnit { unit: 'M', .. })
        ));
    }

    #[test]
    fn test_bad_magnitude_rejected() {
        for input in ["m", "-5m", "+5m", " 5m", "1.5h", "abc5"] {
            assert!(
                matches!(parse_duration(input), Err(DurationParseError::InvalidMagnitude { .. })),
                "expected InvalidMagnitude for {input:?}"
            );
        }
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(matches!(
            parse_duration("99999999999999999999d"),
            Err(DurationParseError::Overflow { .. })
        ));
        assert!(matches!(
            parse_duration("18446744073709551615d"),
            Err(DurationParseError::Overflow { .. })
        ));
    }
}
