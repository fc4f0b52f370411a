//! Calendar-plus-sequence identifiers.
//!
//! A [`TimeKey`] names a minute of local calendar time plus a one-byte
//! sequence number. Minor `0` identifies a Log chunk (and is the usual form
//! of Node and Edge identities); minors `1..=255` identify the entries of the
//! chunk that starts in the same minute.
//!
//! # Canonical strings
//!
//! | Form | Example |
//! |------|---------|
//! | chunk, Node, Edge endpoint | `202401010900` |
//! | entry | `202401010900.1` |
//! | null | `{null-key}` |
//!
//! # Ordering
//!
//! Keys order lexicographically, coarsest field first, which is also the
//! order of their canonical strings for minors below 10.

use crate::error::KeyError;
use chrono::{Datelike, Local, NaiveDate, TimeZone, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Earliest year accepted in a key.
pub const MIN_YEAR: u16 = 1999;

/// Canonical string of the null key.
pub const NULL_KEY_STR: &str = "{null-key}";

/// Length of the `YYYYMMDDHHMM` prefix.
pub const MINUTE_DIGITS: usize = 12;

/// A total-ordering timestamp+sequence key.
///
/// Field order matters: the derived `Ord` compares year, month, day, hour,
/// minute and minor in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeKey {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    minor: u8,
}

impl TimeKey {
    /// The null key. It orders before every valid key.
    pub const NULL: TimeKey = TimeKey {
        year: 0,
        month: 0,
        day: 0,
        hour: 0,
        minute: 0,
        minor: 0,
    };

    /// Creates a validated key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Range`] naming the first component out of range,
    /// checked in the order year, month, day, hour, minute.
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        minor: u8,
    ) -> Result<Self, KeyError> {
        if year < MIN_YEAR {
            return Err(KeyError::range("year"));
        }
        if !(1..=12).contains(&month) {
            return Err(KeyError::range("month"));
        }
        if !(1..=31).contains(&day) {
            return Err(KeyError::range("day"));
        }
        if hour > 23 {
            return Err(KeyError::range("hour"));
        }
        if minute > 59 {
            return Err(KeyError::range("minute"));
        }
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            minor,
        })
    }

    /// Creates a chunk key (minor `0`).
    ///
    /// # Errors
    ///
    /// See [`TimeKey::new`].
    pub fn chunk(year: u16, month: u8, day: u8, hour: u8, minute: u8) -> Result<Self, KeyError> {
        Self::new(year, month, day, hour, minute, 0)
    }

    /// Creates an entry key.
    ///
    /// # Errors
    ///
    /// See [`TimeKey::new`]; additionally `minor_id` when `minor` is `0`.
    pub fn entry(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        minor: u8,
    ) -> Result<Self, KeyError> {
        let key = Self::new(year, month, day, hour, minute, minor)?;
        if minor < 1 {
            return Err(KeyError::range("minor_id"));
        }
        Ok(key)
    }

    /// Parses a chunk string. Only the first 12 characters are read.
    ///
    /// # Errors
    ///
    /// `string size` when shorter than 12 characters, `digits` when the
    /// prefix is not all digits, or a range error.
    pub fn parse_chunk(s: &str) -> Result<Self, KeyError> {
        if s.len() < MINUTE_DIGITS {
            return Err(KeyError::format("string size", s));
        }
        let bytes = s.as_bytes();
        if !bytes[..MINUTE_DIGITS].iter().all(u8::is_ascii_digit) {
            return Err(KeyError::format("digits", s));
        }
        let field = |from: usize, to: usize| -> u16 {
            bytes[from..to]
                .iter()
                .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'))
        };
        // two-digit fields fit in u8
        let narrow = |from: usize| -> u8 { (field(from, from + 2) & 0xff) as u8 };
        Self::new(
            field(0, 4),
            narrow(4),
            narrow(6),
            narrow(8),
            narrow(10),
            0,
        )
    }

    /// Parses an entry string `YYYYMMDDHHMM.m`.
    ///
    /// # Errors
    ///
    /// `string size` when shorter than 14 characters, `format` when the
    /// 13th character is not `.`, `digits` when a numeric part is not
    /// decimal, or a range error (`minor_id` for a minor outside `1..=255`).
    pub fn parse_entry(s: &str) -> Result<Self, KeyError> {
        if s.len() < MINUTE_DIGITS + 2 {
            return Err(KeyError::format("string size", s));
        }
        if s.as_bytes()[MINUTE_DIGITS] != b'.' {
            return Err(KeyError::format("format", s));
        }
        let chunk = Self::parse_chunk(s)?;
        let minor_str = s
            .get(MINUTE_DIGITS + 1..)
            .ok_or_else(|| KeyError::format("format", s))?;
        if !minor_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(KeyError::format("digits", s));
        }
        let minor: u8 = minor_str
            .parse()
            .map_err(|_| KeyError::range("minor_id"))?;
        if minor < 1 {
            return Err(KeyError::range("minor_id"));
        }
        Ok(chunk.with_minor(minor))
    }

    /// Converts a UNIX time through the local time zone.
    ///
    /// Seconds are truncated to the minute.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Epoch`] if `t` has no local representation, or
    /// a range error for years before 1999.
    pub fn from_epoch(t: i64, minor: u8) -> Result<Self, KeyError> {
        let local = Local
            .timestamp_opt(t, 0)
            .single()
            .ok_or(KeyError::Epoch(t))?;
        let year = u16::try_from(local.year()).map_err(|_| KeyError::range("year"))?;
        Self::new(
            year,
            local.month() as u8,
            local.day() as u8,
            local.hour() as u8,
            local.minute() as u8,
            minor,
        )
    }

    /// Returns the key for the current local minute.
    ///
    /// # Errors
    ///
    /// Fails only if the system clock is before 1999.
    pub fn now() -> Result<Self, KeyError> {
        Self::from_epoch(Local::now().timestamp(), 0)
    }

    /// Converts to a UNIX time through the local time zone. The minor is
    /// ignored.
    ///
    /// # Errors
    ///
    /// `day` when the date does not exist in the calendar (such as February
    /// 30th), `local time` when the minute falls in a daylight-saving gap,
    /// and `null` for the null key.
    pub fn to_epoch(&self) -> Result<i64, KeyError> {
        if self.is_null() {
            return Err(KeyError::range("null"));
        }
        let naive = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
        .and_then(|d| d.and_hms_opt(u32::from(self.hour), u32::from(self.minute), 0))
        .ok_or_else(|| KeyError::range("day"))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp())
            .ok_or_else(|| KeyError::range("local time"))
    }

    /// Minutes from `a` to `b` (negative when `b` is earlier).
    ///
    /// # Errors
    ///
    /// See [`TimeKey::to_epoch`].
    pub fn minutes_between(a: &TimeKey, b: &TimeKey) -> Result<i64, KeyError> {
        Ok((b.to_epoch()? - a.to_epoch()?) / 60)
    }

    /// True for the null key.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.month == 0
    }

    /// True for a non-null key with minor `0`.
    #[must_use]
    pub const fn is_chunk(&self) -> bool {
        !self.is_null() && self.minor == 0
    }

    /// True for a non-null key with a minor of at least `1`.
    #[must_use]
    pub const fn is_entry(&self) -> bool {
        !self.is_null() && self.minor > 0
    }

    /// The key of the chunk an entry with this key belongs to.
    #[must_use]
    pub const fn chunk_key(&self) -> TimeKey {
        self.with_minor(0)
    }

    /// Returns a copy with the minor replaced.
    #[must_use]
    pub const fn with_minor(&self, minor: u8) -> TimeKey {
        TimeKey {
            year: self.year,
            month: self.month,
            day: self.day,
            hour: self.hour,
            minute: self.minute,
            minor,
        }
    }

    /// Year.
    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// Month, `1..=12`.
    #[must_use]
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// Day of the month, `1..=31`.
    #[must_use]
    pub const fn day(&self) -> u8 {
        self.day
    }

    /// Hour, `0..=23`.
    #[must_use]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute, `0..=59`.
    #[must_use]
    pub const fn minute(&self) -> u8 {
        self.minute
    }

    /// Sequence number; `0` for chunks.
    #[must_use]
    pub const fn minor(&self) -> u8 {
        self.minor
    }

    /// The `YYYYMMDD` date string.
    #[must_use]
    pub fn ymd_string(&self) -> String {
        format!("{:04}{:02}{:02}", self.year, self.month, self.day)
    }

    /// The `YYYYMMDDHHMM` string, ignoring the minor.
    #[must_use]
    pub fn minute_string(&self) -> String {
        format!(
            "{:04}{:02}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str(NULL_KEY_STR);
        }
        write!(
            f,
            "{:04}{:02}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )?;
        if self.minor > 0 {
            write!(f, ".{}", self.minor)?;
        }
        Ok(())
    }
}

impl FromStr for TimeKey {
    type Err = KeyError;

    /// Parses any canonical form: chunk, entry or null.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == NULL_KEY_STR {
            return Ok(TimeKey::NULL);
        }
        if s.len() > MINUTE_DIGITS {
            Self::parse_entry(s)
        } else {
            Self::parse_chunk(s)
        }
    }
}

impl Serialize for TimeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> TimeKey {
        s.parse().unwrap()
    }

    #[test]
    fn chunk_string_round_trip() {
        let k = TimeKey::chunk(2024, 1, 1, 9, 0).unwrap();
        assert_eq!(k.to_string(), "202401010900");
        assert_eq!(key("202401010900"), k);
        assert!(k.is_chunk());
    }

    #[test]
    fn entry_string_round_trip() {
        let k = TimeKey::entry(2024, 1, 1, 9, 0, 1).unwrap();
        assert_eq!(k.to_string(), "202401010900.1");
        assert_eq!(key("202401010900.1"), k);
        assert_eq!(key("202401010900.17").minor(), 17);
        assert!(k.is_entry());
    }

    #[test]
    fn null_key_has_distinguished_string() {
        assert!(TimeKey::NULL.is_null());
        assert_eq!(TimeKey::NULL.to_string(), "{null-key}");
        assert_eq!(key("{null-key}"), TimeKey::NULL);
        assert!(!TimeKey::NULL.is_chunk());
        assert!(!TimeKey::NULL.is_entry());
    }

    #[test]
    fn validation_order_names_first_bad_field() {
        assert_eq!(TimeKey::new(1998, 0, 0, 99, 99, 0).unwrap_err().field(), "year");
        assert_eq!(TimeKey::new(2024, 13, 0, 0, 0, 0).unwrap_err().field(), "month");
        assert_eq!(TimeKey::new(2024, 1, 32, 0, 0, 0).unwrap_err().field(), "day");
        assert_eq!(TimeKey::new(2024, 1, 1, 24, 0, 0).unwrap_err().field(), "hour");
        assert_eq!(TimeKey::new(2024, 1, 1, 0, 60, 0).unwrap_err().field(), "minute");
        assert_eq!(TimeKey::entry(2024, 1, 1, 0, 0, 0).unwrap_err().field(), "minor_id");
    }

    #[test]
    fn malformed_strings_are_classified() {
        assert_eq!(TimeKey::parse_chunk("2024").unwrap_err().field(), "string size");
        assert_eq!(TimeKey::parse_chunk("2024010109x0").unwrap_err().field(), "digits");
        assert_eq!(TimeKey::parse_entry("2024010109001").unwrap_err().field(), "string size");
        assert_eq!(TimeKey::parse_entry("202401010900:1").unwrap_err().field(), "format");
        assert_eq!(TimeKey::parse_entry("202401010900.a").unwrap_err().field(), "digits");
        assert_eq!(TimeKey::parse_entry("202401010900.0").unwrap_err().field(), "minor_id");
        assert_eq!(TimeKey::parse_entry("202401010900.256").unwrap_err().field(), "minor_id");
        assert_eq!("202413010900".parse::<TimeKey>().unwrap_err().field(), "month");
    }

    #[test]
    fn non_ascii_input_does_not_panic() {
        assert!("2024010109€0".parse::<TimeKey>().is_err());
        assert!("202401010900é".parse::<TimeKey>().is_err());
    }

    #[test]
    fn ordering_is_coarsest_field_first() {
        let mut keys = vec![
            key("202401011000"),
            key("202401010900.2"),
            key("202312312359"),
            key("202401010900"),
            key("202401010900.1"),
        ];
        keys.sort();
        let strings: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(
            strings,
            [
                "202312312359",
                "202401010900",
                "202401010900.1",
                "202401010900.2",
                "202401011000"
            ]
        );
        assert!(TimeKey::NULL < key("199901010000"));
    }

    #[test]
    fn chunk_key_and_minor_helpers() {
        let e = key("202401010900.3");
        assert_eq!(e.chunk_key(), key("202401010900"));
        assert_eq!(e.chunk_key().with_minor(3), e);
        assert_eq!(e.ymd_string(), "20240101");
        assert_eq!(e.minute_string(), "202401010900");
    }

    #[test]
    fn epoch_round_trip_in_local_time() {
        let k = key("202406150930");
        let t = k.to_epoch().unwrap();
        assert_eq!(TimeKey::from_epoch(t, 0).unwrap(), k);
        assert_eq!(TimeKey::from_epoch(t + 59, 4).unwrap(), k.with_minor(4));
    }

    #[test]
    fn minutes_between_keys() {
        let a = key("202406150900");
        let b = key("202406150955");
        assert_eq!(TimeKey::minutes_between(&a, &b).unwrap(), 55);
        assert_eq!(TimeKey::minutes_between(&b, &a).unwrap(), -55);
    }

    #[test]
    fn impossible_calendar_date_has_no_epoch() {
        let k = key("202402300900");
        assert_eq!(k.to_epoch().unwrap_err().field(), "day");
        assert!(TimeKey::NULL.to_epoch().is_err());
    }

    #[test]
    fn serde_uses_canonical_string() {
        let k = key("202401010900.2");
        let json = serde_json_like(&k);
        assert_eq!(json, "202401010900.2");
    }

    fn serde_json_like(k: &TimeKey) -> String {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(k, &mut buf).unwrap();
        let back: String = ciborium::de::from_reader(buf.as_slice()).unwrap();
        let again: TimeKey = ciborium::de::from_reader(buf.as_slice()).unwrap();
        assert_eq!(&again, k);
        back
    }
}
