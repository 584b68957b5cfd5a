//! Delay literal parsing: `1`, `1.5`, `500ms`, `1m30s750ms`.

use std::time::Duration;

use crate::error::ParseError;

/// Parse one `+`-prefixed delay term (the part after the `+`), which may itself
/// concatenate several `number unit?` pairs without repeating `+`
/// (`1m30s750ms` = 90.750s).
fn parse_term(term: &str) -> Result<f64, ParseError> {
    if term.is_empty() {
        return Err(ParseError::BadDelay(term.to_string()));
    }

    let bytes = term.as_bytes();
    let mut i = 0;
    let mut total = 0.0f64;
    let mut saw_number = false;

    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
            i += 1;
        }
        if i == start {
            return Err(ParseError::BadDelay(term.to_string()));
        }
        let number: f64 = term[start..i]
            .parse()
            .map_err(|_| ParseError::BadDelay(term.to_string()))?;
        if number < 0.0 {
            return Err(ParseError::BadDelay(term.to_string()));
        }

        let unit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let unit = &term[unit_start..i];
        let scale = match unit {
            "" | "s" => 1.0,
            "ms" => 0.001,
            "m" => 60.0,
            _ => return Err(ParseError::BadDelay(term.to_string())),
        };

        total += number * scale;
        saw_number = true;
    }

    if !saw_number {
        return Err(ParseError::BadDelay(term.to_string()));
    }

    Ok(total)
}

/// Parse a single delay term into a `Duration`. Accepts the same grammar as
/// one `+DELAY` clause in a command expression, minus the leading `+`.
pub fn parse_delay(term: &str) -> Result<Duration, ParseError> {
    let seconds = parse_term(term)?;
    Ok(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_seconds() {
        assert_eq!(parse_delay("1").unwrap(), Duration::from_secs_f64(1.0));
        assert_eq!(parse_delay("1.5").unwrap(), Duration::from_secs_f64(1.5));
    }

    #[test]
    fn milliseconds() {
        assert_eq!(parse_delay("500ms").unwrap(), Duration::from_secs_f64(0.5));
    }

    #[test]
    fn chained_term() {
        assert_eq!(
            parse_delay("1m30s750ms").unwrap(),
            Duration::from_secs_f64(90.750)
        );
    }

    #[test]
    fn idempotent_under_unit_reordering() {
        assert_eq!(parse_delay("1m30s").unwrap(), parse_delay("30s1m").unwrap());
        assert_eq!(parse_delay("1m30s").unwrap(), Duration::from_secs_f64(90.0));
    }

    #[test]
    fn negative_rejected() {
        assert!(parse_delay("-1").is_err());
    }

    #[test]
    fn unknown_unit_rejected() {
        assert!(parse_delay("1h").is_err());
    }

    #[test]
    fn empty_rejected() {
        assert!(parse_delay("").is_err());
    }
}
