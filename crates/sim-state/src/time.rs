//! Simulation Time Types
//!
//! Wall-clock simulation time plus the tick granularity ladder.
//!
//! # Example
//!
//! ```
//! use sim_state::{SimTime, TickGranularity};
//!
//! let t: SimTime = "2025-06-01T08:30:00Z".parse().unwrap();
//! let next = t.plus_seconds(TickGranularity::M15.seconds());
//! assert_eq!(next.to_string(), "2025-06-01T08:45:00Z");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A point in simulation time, stored as unix seconds (UTC).
///
/// Serializes to strings like "2025-06-01T08:30:00Z".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(pub i64);

impl SimTime {
    /// Creates a SimTime from unix seconds.
    pub fn from_unix(secs: i64) -> Self {
        Self(secs)
    }

    /// Creates a SimTime from calendar components (UTC).
    pub fn from_ymd_hms(year: i64, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        let days = days_from_civil(year, month, day);
        Self(days * 86_400 + i64::from(hour) * 3_600 + i64::from(min) * 60 + i64::from(sec))
    }

    /// Unix seconds.
    pub fn unix(self) -> i64 {
        self.0
    }

    /// Returns this time shifted forward by `secs` seconds (negative shifts back).
    pub fn plus_seconds(self, secs: i64) -> Self {
        Self(self.0 + secs)
    }

    /// Signed difference `self - other` in seconds.
    pub fn seconds_since(self, other: SimTime) -> i64 {
        self.0 - other.0
    }

    /// Fractional days elapsed since `other` (0.0 if `other` is later).
    pub fn days_since(self, other: SimTime) -> f64 {
        (self.0 - other.0).max(0) as f64 / 86_400.0
    }

    /// Truncates to the start of the containing UTC day.
    pub fn day_start(self) -> Self {
        Self(self.0.div_euclid(86_400) * 86_400)
    }
}

// Civil-date conversion (proleptic Gregorian), Hinnant's algorithm.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = i64::from(month);
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m as u32, d as u32)
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = self.0.div_euclid(86_400);
        let secs = self.0.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            year,
            month,
            day,
            secs / 3_600,
            (secs % 3_600) / 60,
            secs % 60
        )
    }
}

/// Error type for parsing SimTime from strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeError(pub String);

impl fmt::Display for ParseTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid timestamp: '{}', expected 'YYYY-MM-DDTHH:MM:SSZ'",
            self.0
        )
    }
}

impl std::error::Error for ParseTimeError {}

impl FromStr for SimTime {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeError(s.to_string());
        let body = s.strip_suffix('Z').unwrap_or(s);
        let (date, time) = body.split_once('T').ok_or_else(err)?;

        let mut date_parts = date.splitn(3, '-');
        let year: i64 = date_parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let month: u32 = date_parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let day: u32 = date_parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;

        let mut time_parts = time.splitn(3, ':');
        let hour: u32 = time_parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let min: u32 = time_parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let sec: u32 = time_parts.next().unwrap_or("0").parse().map_err(|_| err())?;

        if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || min > 59 || sec > 59 {
            return Err(err());
        }

        Ok(SimTime::from_ymd_hms(year, month, day, hour, min, sec))
    }
}

// Serialize SimTime as its string form so ledgers stay human-readable.
impl Serialize for SimTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Tick granularity ladder for the simulation clock.
///
/// Serializes to strings like "15m".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TickGranularity {
    M1,
    M5,
    #[default]
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H12,
    D1,
}

impl TickGranularity {
    /// Length of one tick in seconds.
    pub fn seconds(self) -> i64 {
        match self {
            TickGranularity::M1 => 60,
            TickGranularity::M5 => 5 * 60,
            TickGranularity::M15 => 15 * 60,
            TickGranularity::M30 => 30 * 60,
            TickGranularity::H1 => 3_600,
            TickGranularity::H2 => 2 * 3_600,
            TickGranularity::H4 => 4 * 3_600,
            TickGranularity::H6 => 6 * 3_600,
            TickGranularity::H12 => 12 * 3_600,
            TickGranularity::D1 => 86_400,
        }
    }
}

impl fmt::Display for TickGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TickGranularity::M1 => "1m",
            TickGranularity::M5 => "5m",
            TickGranularity::M15 => "15m",
            TickGranularity::M30 => "30m",
            TickGranularity::H1 => "1h",
            TickGranularity::H2 => "2h",
            TickGranularity::H4 => "4h",
            TickGranularity::H6 => "6h",
            TickGranularity::H12 => "12h",
            TickGranularity::D1 => "1d",
        };
        write!(f, "{}", s)
    }
}

// Serialize TickGranularity as its string form ("15m") for configs and rows.
impl Serialize for TickGranularity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TickGranularity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for parsing TickGranularity from strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGranularityError(pub String);

impl fmt::Display for ParseGranularityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid tick granularity: '{}'", self.0)
    }
}

impl std::error::Error for ParseGranularityError {}

impl FromStr for TickGranularity {
    type Err = ParseGranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(TickGranularity::M1),
            "5m" => Ok(TickGranularity::M5),
            "15m" => Ok(TickGranularity::M15),
            "30m" => Ok(TickGranularity::M30),
            "1h" => Ok(TickGranularity::H1),
            "2h" => Ok(TickGranularity::H2),
            "4h" => Ok(TickGranularity::H4),
            "6h" => Ok(TickGranularity::H6),
            "12h" => Ok(TickGranularity::H12),
            "1d" => Ok(TickGranularity::D1),
            _ => Err(ParseGranularityError(s.to_string())),
        }
    }
}
