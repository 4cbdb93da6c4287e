//! Duration grammar.
//!
//! Accepts ISO-8601 durations (`PT1.5S`, `P2DT3H`, `PT10M`) or the compact
//! humantime form (`10s`, `200millis`, `1h 30m`, `3 minutes`). A single
//! fractional term such as `1.5h` is scaled from its unit. A bare number is
//! milliseconds. Unit names are case-sensitive.

use std::time::Duration;

use crate::error::StratumError;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a duration, trying ISO-8601 first and the compact form second.
pub fn parse_duration(input: &str) -> Result<Duration, StratumError> {
    let s = input.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    if let Some(d) = parse_iso(s) {
        return Ok(d);
    }
    if let Some(d) = parse_fractional(s, input)? {
        return Ok(d);
    }
    humantime::parse_duration(s)
        .map_err(|e| StratumError::Parse(format!("'{input}' is not a valid duration: {e}")))
}

/// Render a duration in the compact form, choosing the largest exact unit.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    for (unit, size) in [
        ("d", 86_400 * NANOS_PER_SEC),
        ("h", 3_600 * NANOS_PER_SEC),
        ("m", 60 * NANOS_PER_SEC),
        ("s", NANOS_PER_SEC),
        ("ms", 1_000_000),
        ("us", 1_000),
    ] {
        if nanos != 0 && nanos % size == 0 {
            return format!("{}{unit}", nanos / size);
        }
    }
    format!("{nanos}ns")
}

/// `1.5h`: humantime only takes whole numbers, so scale one unit of the suffix.
fn parse_fractional(s: &str, input: &str) -> Result<Option<Duration>, StratumError> {
    let Some(cut) = s.find(char::is_alphabetic) else {
        return Ok(None);
    };
    let (number, unit) = (s[..cut].trim(), &s[cut..]);
    if !number.contains('.') || unit.contains(char::is_whitespace) {
        return Ok(None);
    }
    let n: f64 = number
        .parse()
        .map_err(|_| StratumError::Parse(format!("'{input}' is not a valid duration")))?;
    let per_unit = humantime::parse_duration(&format!("1{unit}"))
        .map_err(|e| StratumError::Parse(format!("'{input}' is not a valid duration: {e}")))?;
    Duration::try_from_secs_f64(n * per_unit.as_secs_f64())
        .map(Some)
        .map_err(|_| StratumError::Parse(format!("Duration '{input}' is out of range")))
}

fn from_nanos(nanos: u128) -> Option<Duration> {
    let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
}

fn parse_iso(s: &str) -> Option<Duration> {
    let upper = s.to_ascii_uppercase();
    let rest = upper.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };
    if date.is_empty() && time.is_none_or(str::is_empty) {
        return None;
    }
    let mut nanos: u128 = 0;
    if !date.is_empty() {
        let days: u128 = date.strip_suffix('D')?.parse().ok()?;
        nanos = nanos.checked_add(days.checked_mul(86_400 * NANOS_PER_SEC)?)?;
    }
    if let Some(time) = time {
        if time.is_empty() {
            return None;
        }
        let mut remaining = time;
        let mut last_rank = 0;
        while !remaining.is_empty() {
            let end = remaining.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
            let (number, tail) = remaining.split_at(end);
            let mut chars = tail.chars();
            let designator = chars.next()?;
            remaining = chars.as_str();
            let (rank, part) = match designator {
                'H' => (1, number.parse::<u128>().ok()?.checked_mul(3_600 * NANOS_PER_SEC)?),
                'M' => (2, number.parse::<u128>().ok()?.checked_mul(60 * NANOS_PER_SEC)?),
                'S' => (3, iso_seconds(number)?),
                _ => return None,
            };
            if rank <= last_rank {
                return None;
            }
            last_rank = rank;
            nanos = nanos.checked_add(part)?;
        }
    }
    from_nanos(nanos)
}

fn iso_seconds(number: &str) -> Option<u128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs: u128 = whole.parse().ok()?;
    let frac: u128 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<9}").parse().ok()?
    };
    secs.checked_mul(NANOS_PER_SEC)?.checked_add(frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_is_millis() {
        assert_eq!(parse_duration("200").unwrap(), Duration::from_millis(200));
    }

    #[test]
    fn compact_units() {
        assert_eq!(parse_duration("200millis").unwrap(), Duration::from_millis(200));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("10 seconds").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(172_800));
        assert_eq!(parse_duration("7us").unwrap(), Duration::from_micros(7));
        assert_eq!(parse_duration("9ns").unwrap(), Duration::from_nanos(9));
        assert_eq!(parse_duration("1 minute").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1h 30m").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn fractional_term_scales_its_unit() {
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("0.5 s").unwrap(), Duration::from_millis(500));
        assert!(parse_duration("1.5 fortnights").is_err());
    }

    #[test]
    fn iso_forms() {
        assert_eq!(parse_duration("PT1.5S").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("P2DT3H").unwrap(), Duration::from_secs(2 * 86_400 + 3 * 3_600));
        assert_eq!(parse_duration("PT10M").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("pt1h30m").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn units_are_case_sensitive() {
        let err = parse_duration("10MS").unwrap_err();
        assert!(err.to_string().contains("MS"));
    }

    #[test]
    fn missing_number_mentions_input() {
        let err = parse_duration("ms").unwrap_err();
        assert!(err.to_string().contains("'ms'"));
    }

    #[test]
    fn negative_rejected() {
        assert!(parse_duration("-1.5s").is_err());
        assert!(parse_duration("-10s").is_err());
    }

    #[test]
    fn format_uses_largest_exact_unit() {
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::from_nanos(3)), "3ns");
        assert_eq!(format_duration(Duration::ZERO), "0ns");
    }

    #[test]
    fn format_round_trips() {
        for d in [Duration::from_millis(250), Duration::from_secs(86_400), Duration::from_nanos(1_234)] {
            assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
        }
    }
}
