//! Size-in-bytes values and their grammar.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StratumError;

/// Split trailing letters off a number: `"10k"` → `("10", "k")`.
fn split_units(s: &str) -> (&str, &str) {
    let cut = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphabetic())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    (s[..cut].trim(), &s[cut..])
}

/// A non-negative number of bytes, parsed from strings such as `10k`,
/// `512MiB` or `2 GB`. A bare number is bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SizeInBytes(pub u64);

impl SizeInBytes {
    pub fn bytes(self) -> u64 {
        self.0
    }

    pub fn parse(input: &str) -> Result<Self, StratumError> {
        let s = input.trim();
        let (number, unit) = split_units(s);
        if number.is_empty() {
            return Err(StratumError::Parse(format!(
                "No number in size-in-bytes value '{input}'"
            )));
        }
        let multiplier = unit_bytes(unit).ok_or_else(|| {
            StratumError::Parse(format!(
                "Could not parse size-in-bytes unit '{unit}' (try k, K, kB, KiB, kilobytes, kibibytes)"
            ))
        })?;
        let out_of_range = || {
            StratumError::Parse(format!(
                "size-in-bytes value is out of range for a 64-bit integer: '{input}'"
            ))
        };
        let bytes = if number.bytes().all(|b| b.is_ascii_digit()) {
            let n: u128 = number.parse().map_err(|_| out_of_range())?;
            n.checked_mul(multiplier).ok_or_else(out_of_range)?
        } else {
            let n: f64 = number.parse().map_err(|_| {
                StratumError::Parse(format!("Could not parse size-in-bytes number '{number}'"))
            })?;
            if !n.is_finite() || n < 0.0 {
                return Err(StratumError::Parse(format!(
                    "Could not parse size-in-bytes number '{number}'"
                )));
            }
            (n * multiplier as f64) as u128
        };
        u64::try_from(bytes).map(SizeInBytes).map_err(|_| out_of_range())
    }
}

const PREFIXES: [(&str, u128, u32); 16] = [
    ("kilo", 1000, 1),
    ("mega", 1000, 2),
    ("giga", 1000, 3),
    ("tera", 1000, 4),
    ("peta", 1000, 5),
    ("exa", 1000, 6),
    ("zetta", 1000, 7),
    ("yotta", 1000, 8),
    ("kibi", 1024, 1),
    ("mebi", 1024, 2),
    ("gibi", 1024, 3),
    ("tebi", 1024, 4),
    ("pebi", 1024, 5),
    ("exbi", 1024, 6),
    ("zebi", 1024, 7),
    ("yobi", 1024, 8),
];

fn unit_bytes(unit: &str) -> Option<u128> {
    match unit {
        "" | "b" | "B" | "byte" | "bytes" => return Some(1),
        _ => {}
    }
    for (prefix, radix, power) in PREFIXES {
        let bytes = radix.pow(power);
        if unit == format!("{prefix}byte") || unit == format!("{prefix}bytes") {
            return Some(bytes);
        }
        let first = &prefix[..1];
        let upper = first.to_uppercase();
        let matched = if radix == 1000 {
            if power == 1 {
                unit == format!("{first}B")
            } else {
                unit == format!("{upper}B")
            }
        } else {
            unit == first
                || unit == upper
                || unit == format!("{upper}i")
                || unit == format!("{upper}iB")
        };
        if matched {
            return Some(bytes);
        }
    }
    None
}

impl fmt::Display for SizeInBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for SizeInBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for SizeInBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bytes(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Bytes(b) => Ok(SizeInBytes(b)),
            Raw::Text(s) => SizeInBytes::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}
