//! Graphite plaintext line parsing
//!
//! `<identifier> <value> <unix-seconds>`, fields separated by whitespace.

use chrono::{DateTime, Utc};
use contracts::IncomingPoint;

use crate::error::{IngestionError, Result};

/// Parse one plaintext line into a fresh (hops = 0) point
///
/// The value may be `nan`. The timestamp may carry a fractional part.
pub fn parse_line(line: &str) -> Result<IncomingPoint> {
    let mut fields = line.split_whitespace();

    let (Some(ident), Some(value), Some(ts), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(IngestionError::parse_failed(
            line,
            "expected '<identifier> <value> <timestamp>'",
        ));
    };

    let value: f64 = value
        .parse()
        .map_err(|e| IngestionError::parse_failed(line, format!("bad value '{value}': {e}")))?;

    let timestamp = parse_timestamp(ts)
        .ok_or_else(|| IngestionError::parse_failed(line, format!("bad timestamp '{ts}'")))?;

    Ok(IncomingPoint::new(ident, timestamp, value))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }

    let secs: f64 = raw.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_timestamp() {
        let point = parse_line("foo.bar 42.5 1700000000\n").unwrap();
        assert_eq!(point.ident, "foo.bar");
        assert_eq!(point.value, 42.5);
        assert_eq!(point.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(point.hops, 0);
    }

    #[test]
    fn test_parse_fractional_timestamp() {
        let point = parse_line("a.b 1 1700000000.25").unwrap();
        assert_eq!(point.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(point.timestamp.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_nan_value() {
        let point = parse_line("a.b nan 1700000000").unwrap();
        assert!(point.is_nan());
    }

    #[test]
    fn test_rejects_wrong_field_count() {
        assert!(parse_line("a.b 1").is_err());
        assert!(parse_line("a.b 1 2 3").is_err());
        assert!(parse_line("").is_err());
    }

    #[test]
    fn test_rejects_bad_fields() {
        let err = parse_line("a.b abc 1700000000").unwrap_err();
        assert!(err.to_string().contains("bad value"));

        let err = parse_line("a.b 1 yesterday").unwrap_err();
        assert!(err.to_string().contains("bad timestamp"));

        assert!(parse_line("a.b 1 -5.5").is_err());
    }
}
