//! Token lifetime parsing
//!
//! Accepts `"<seconds>"` or `"<n><unit>"` with unit one of `s m h d w`.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpiryError {
    #[error("invalid expiry format: {0:?} (expected e.g. \"900\", \"15m\", \"7d\")")]
    InvalidFormat(String),
    #[error("expiry out of range: {0:?}")]
    Overflow(String),
}

/// Token lifetime in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    secs: u64,
}

impl Expiry {
    pub const fn from_secs(secs: u64) -> Self {
        Self { secs }
    }

    pub const fn as_secs(&self) -> u64 {
        self.secs
    }

    /// Absolute expiry for a token issued at `now`
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = i64::try_from(self.secs).unwrap_or(i64::MAX);
        Duration::try_seconds(secs)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl FromStr for Expiry {
    type Err = ExpiryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || ExpiryError::InvalidFormat(s.to_string());

        let (digits, multiplier) = match raw.char_indices().last() {
            Some((idx, unit)) if unit.is_ascii_alphabetic() => {
                let multiplier: u64 = match unit {
                    's' => 1,
                    'm' => 60,
                    'h' => 60 * 60,
                    'd' => 24 * 60 * 60,
                    'w' => 7 * 24 * 60 * 60,
                    _ => return Err(invalid()),
                };
                (&raw[..idx], multiplier)
            }
            Some(_) => (raw, 1),
            None => return Err(invalid()),
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let value: u64 = digits
            .parse()
            .map_err(|_| ExpiryError::Overflow(s.to_string()))?;
        let secs = value
            .checked_mul(multiplier)
            .ok_or_else(|| ExpiryError::Overflow(s.to_string()))?;
        Ok(Self { secs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!("7d".parse::<Expiry>().unwrap().as_secs(), 604_800);
        assert_eq!("15m".parse::<Expiry>().unwrap().as_secs(), 900);
        assert_eq!("2h".parse::<Expiry>().unwrap().as_secs(), 7_200);
        assert_eq!("30s".parse::<Expiry>().unwrap().as_secs(), 30);
        assert_eq!("1w".parse::<Expiry>().unwrap().as_secs(), 604_800);
    }

    #[test]
    fn bare_number_is_seconds() {
        assert_eq!("3600".parse::<Expiry>().unwrap().as_secs(), 3_600);
        assert_eq!(" 60 ".parse::<Expiry>().unwrap().as_secs(), 60);
    }

    #[test]
    fn rejects_unknown_shapes() {
        for bad in ["10x", "", "m", "-5m", "1.5h", "15 m", "abc", "7dd"] {
            assert!(
                matches!(bad.parse::<Expiry>(), Err(ExpiryError::InvalidFormat(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn overflow_is_reported() {
        let too_many_weeks = format!("{}w", u64::MAX / 2);
        assert!(matches!(
            too_many_weeks.parse::<Expiry>(),
            Err(ExpiryError::Overflow(_))
        ));
        assert!(matches!(
            "99999999999999999999999".parse::<Expiry>(),
            Err(ExpiryError::Overflow(_))
        ));
    }

    #[test]
    fn expires_at_adds_duration() {
        let now = Utc::now();
        let at = Expiry::from_secs(900).expires_at(now);
        assert_eq!((at - now).num_seconds(), 900);
    }

    #[test]
    fn expires_at_saturates() {
        let now = Utc::now();
        assert_eq!(
            Expiry::from_secs(u64::MAX).expires_at(now),
            DateTime::<Utc>::MAX_UTC
        );
    }
}
