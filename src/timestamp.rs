use std::cmp;
use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{
    de::{Deserialize, Deserializer, Error, Unexpected, Visitor},
    ser::{Serialize, Serializer},
};

const MAX_NANOSEC: u32 = 999_999_999;
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const ISO_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Seconds and nanoseconds since the Unix epoch, in UTC.
///
/// Cache files carry record times as floating-point epoch seconds. These are rounded to whole
/// microseconds on the way in, and rendered as ISO-8601 without a zone suffix.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Timestamp {
    sec: i64,
    nano: u32,
}

impl Timestamp {
    /// Create a timestamp from a raw seconds + nanoseconds value
    pub fn from_utc(sec: i64, nano: u32) -> Option<Timestamp> {
        if nano > MAX_NANOSEC {
            None
        } else {
            Some(Timestamp { sec, nano })
        }
    }

    pub fn from_sec(sec: i64) -> Timestamp {
        Timestamp { sec, nano: 0 }
    }

    /// Convert fractional epoch seconds, rounding to the nearest microsecond. Fails for NaN,
    /// infinities, and values outside the `i64` second range.
    pub fn from_epoch_f64(secs: f64) -> Option<Timestamp> {
        if !secs.is_finite() {
            return None;
        }
        let micros = (secs * 1e6).round();
        if micros.abs() >= i64::MAX as f64 {
            return None;
        }
        let micros = micros as i64;
        Some(Timestamp {
            sec: micros.div_euclid(1_000_000),
            nano: micros.rem_euclid(1_000_000) as u32 * 1000,
        })
    }

    /// Return the UNIX timestamp (number of seconds since January 1, 1970 0:00:00 UTC).
    pub fn timestamp_utc(&self) -> i64 {
        self.sec
    }

    /// Returns the number of nanoseconds past the second count.
    pub fn timestamp_subsec_nanos(&self) -> u32 {
        self.nano
    }

    /// Render as `YYYY-MM-DDTHH:MM:SS`, with a six-digit fraction only when there are
    /// sub-second parts. Returns `None` if the time is outside the calendar's range.
    pub fn to_iso8601(&self) -> Option<String> {
        let dt = DateTime::from_timestamp(self.sec, self.nano)?;
        let mut out = dt.format(ISO_FORMAT).to_string();
        if self.nano != 0 {
            out.push_str(&format!(".{:06}", self.nano / 1000));
        }
        Some(out)
    }

    /// Parse the form produced by [`to_iso8601`](Self::to_iso8601). The fraction may have any
    /// number of digits or be left out.
    pub fn parse_iso8601(s: &str) -> Option<Timestamp> {
        let dt = NaiveDateTime::parse_from_str(s, ISO_PARSE_FORMAT).ok()?.and_utc();
        Timestamp::from_utc(dt.timestamp(), dt.timestamp_subsec_nanos())
    }
}

impl cmp::Ord for Timestamp {
    fn cmp(&self, other: &Timestamp) -> cmp::Ordering {
        if self.sec == other.sec {
            self.nano.cmp(&other.nano)
        } else {
            self.sec.cmp(&other.sec)
        }
    }
}

impl cmp::PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Timestamp) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_iso8601() {
            Some(s) => f.write_str(&s),
            None => write!(f, "UTC: {} sec + {} ns", self.sec, self.nano),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    /// Accepts epoch seconds as any number, or an ISO-8601 string.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimeVisitor;

        impl<'de> Visitor<'de> for TimeVisitor {
            type Value = Timestamp;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(fmt, "epoch seconds or an ISO-8601 time")
            }

            fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Timestamp::from_sec(v))
            }

            fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v)
                    .map(Timestamp::from_sec)
                    .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
            }

            fn visit_f64<E: Error>(self, v: f64) -> Result<Self::Value, E> {
                Timestamp::from_epoch_f64(v).ok_or_else(|| E::invalid_value(Unexpected::Float(v), &self))
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
                Timestamp::parse_iso8601(v).ok_or_else(|| E::invalid_value(Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(TimeVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn epoch() {
        let t = Timestamp::from_sec(0);
        assert_eq!(t.to_iso8601().unwrap(), "1970-01-01T00:00:00");
        assert_eq!(serde_json::to_value(t).unwrap(), serde_json::json!("1970-01-01T00:00:00"));
    }

    #[test]
    fn fractional() {
        let t = Timestamp::from_epoch_f64(1_400_000_000.25).unwrap();
        assert_eq!(t.timestamp_utc(), 1_400_000_000);
        assert_eq!(t.timestamp_subsec_nanos(), 250_000_000);
        assert_eq!(t.to_iso8601().unwrap(), "2014-05-13T16:53:20.250000");
        assert_eq!(Timestamp::parse_iso8601("2014-05-13T16:53:20.250000"), Some(t));
    }

    #[test]
    fn before_epoch() {
        let t = Timestamp::from_epoch_f64(-0.5).unwrap();
        assert_eq!((t.timestamp_utc(), t.timestamp_subsec_nanos()), (-1, 500_000_000));
        assert_eq!(t.to_iso8601().unwrap(), "1969-12-31T23:59:59.500000");
        assert!(t < Timestamp::from_sec(0));
    }

    #[test]
    fn rejects() {
        assert!(Timestamp::from_epoch_f64(f64::NAN).is_none());
        assert!(Timestamp::from_epoch_f64(f64::INFINITY).is_none());
        assert!(Timestamp::from_utc(0, 1_000_000_000).is_none());
        assert!(Timestamp::from_sec(i64::MAX).to_iso8601().is_none());
        assert!(Timestamp::parse_iso8601("yesterday").is_none());
    }

    #[test]
    fn deserialize_forms() {
        let t: Timestamp = serde_json::from_str("86400").unwrap();
        assert_eq!(t, Timestamp::from_sec(86400));
        let t: Timestamp = serde_json::from_str("1.5").unwrap();
        assert_eq!(t, Timestamp::from_utc(1, 500_000_000).unwrap());
        let t: Timestamp = serde_json::from_str("\"1970-01-02T00:00:00\"").unwrap();
        assert_eq!(t, Timestamp::from_sec(86400));
        assert!(serde_json::from_str::<Timestamp>("true").is_err());
    }
}
