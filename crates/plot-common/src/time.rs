//! Time handling for plot requests.
//!
//! Backends speak J2K seconds: floating point seconds since
//! 2000-01-01T12:00:00Z. Request times are parsed in the panel's time zone
//! and converted to UTC J2K before any query is built.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};

/// Unix timestamp of the J2K epoch (2000-01-01T12:00:00Z).
pub const J2K_EPOCH_UNIX: i64 = 946_728_000;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 3_600.0;
const DAY: f64 = 86_400.0;

/// Convert a UTC instant to J2K seconds.
pub fn datetime_to_j2k(dt: &DateTime<Utc>) -> f64 {
    let secs = dt.timestamp() - J2K_EPOCH_UNIX;
    secs as f64 + f64::from(dt.timestamp_subsec_millis()) / 1000.0
}

/// Convert J2K seconds to a UTC instant.
pub fn j2k_to_datetime(j2k: f64) -> Option<DateTime<Utc>> {
    if !j2k.is_finite() {
        return None;
    }
    let millis = ((j2k * 1000.0).round() as i64).checked_add(J2K_EPOCH_UNIX * 1000)?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Current time in J2K seconds.
pub fn now_j2k() -> f64 {
    datetime_to_j2k(&Utc::now())
}

/// Format a J2K instant as `yyyy-MM-dd`.
pub fn format_date(j2k: f64) -> String {
    j2k_to_datetime(j2k)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Format a J2K instant as `yyyy-MM-dd HH:mm:ss.SSS`.
pub fn format_timestamp(j2k: f64) -> String {
    j2k_to_datetime(j2k)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// A fixed-offset time zone attached to a panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeZoneSpec {
    /// Display name, e.g. `UTC` or `UTC-10:00`
    pub name: String,
    /// Offset from UTC in seconds (positive east)
    pub offset_seconds: f64,
}

impl TimeZoneSpec {
    pub fn utc() -> Self {
        Self {
            name: "UTC".to_string(),
            offset_seconds: 0.0,
        }
    }

    /// Build from an offset in hours.
    pub fn from_hours(hours: f64) -> Self {
        if hours == 0.0 {
            return Self::utc();
        }
        let total_minutes = (hours * 60.0).round() as i64;
        let sign = if total_minutes < 0 { '-' } else { '+' };
        let abs = total_minutes.abs();
        Self {
            name: format!("UTC{}{:02}:{:02}", sign, abs / 60, abs % 60),
            offset_seconds: total_minutes as f64 * MINUTE,
        }
    }

    /// Parse `UTC`/`GMT`/`Z`, an hours offset (`-10`, `+5.5`) or `±HH:MM`.
    pub fn parse(s: &str) -> PlotResult<Self> {
        let s = s.trim();
        let upper = s.to_ascii_uppercase();
        if matches!(upper.as_str(), "UTC" | "GMT" | "Z") {
            return Ok(Self::utc());
        }

        let body = upper
            .strip_prefix("UTC")
            .or_else(|| upper.strip_prefix("GMT"))
            .unwrap_or(&upper);

        let hours = if let Some((h, m)) = body.split_once(':') {
            let negative = h.starts_with('-');
            let h: f64 = h
                .parse()
                .map_err(|_| PlotError::InvalidTime(format!("bad time zone: {}", s)))?;
            let m: f64 = m
                .parse()
                .map_err(|_| PlotError::InvalidTime(format!("bad time zone: {}", s)))?;
            if !(0.0..60.0).contains(&m) {
                return Err(PlotError::InvalidTime(format!("bad time zone: {}", s)));
            }
            if negative {
                h - m / 60.0
            } else {
                h + m / 60.0
            }
        } else {
            body.parse::<f64>()
                .map_err(|_| PlotError::InvalidTime(format!("bad time zone: {}", s)))?
        };

        if !(-14.0..=14.0).contains(&hours) {
            return Err(PlotError::InvalidTime(format!("time zone offset out of range: {}", s)));
        }
        Ok(Self::from_hours(hours))
    }
}

impl Default for TimeZoneSpec {
    fn default() -> Self {
        Self::utc()
    }
}

/// A validated `[start, end]` interval in J2K seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// Create a range; `start` must be strictly before `end`.
    pub fn new(start: f64, end: f64) -> PlotResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(PlotError::InvalidTime("times must be finite".to_string()));
        }
        if let Some(t) = [start, end].into_iter().find(|t| j2k_to_datetime(*t).is_none()) {
            return Err(PlotError::InvalidTime(format!("time out of range: {}", t)));
        }
        if start >= end {
            return Err(PlotError::InvalidTime(format!(
                "start time {} is not before end time {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse the `st`/`et` pair of a panel.
    ///
    /// Absolute times are read in `tz` and converted to UTC.
    pub fn parse(st: &str, et: Option<&str>, tz: &TimeZoneSpec, now: f64) -> PlotResult<Self> {
        let end = parse_end_time(et.unwrap_or("N"), tz, now)?;
        let start = parse_start_time(st, end, tz)?;
        Self::new(start, end)
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    /// Shift both ends by `offset` seconds (UTC to local display time).
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

/// Parse an end time: `N`/`now`, J2K seconds, or `yyyyMMdd[HHmm[ss[SSS]]]`.
pub fn parse_end_time(s: &str, tz: &TimeZoneSpec, now: f64) -> PlotResult<f64> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("n") || s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }
    parse_absolute_or_numeric(s, tz)
}

/// Parse a start time; accepts everything an end time does plus `-<n><unit>`
/// relative to `end`.
pub fn parse_start_time(s: &str, end: f64, tz: &TimeZoneSpec) -> PlotResult<f64> {
    let s = s.trim();
    if let Some(rel) = s.strip_prefix('-') {
        if let Some(unit) = rel.chars().last().filter(|c| c.is_ascii_alphabetic()) {
            let amount: f64 = rel[..rel.len() - unit.len_utf8()]
                .parse()
                .map_err(|_| PlotError::InvalidTime(format!("bad relative time: {}", s)))?;
            let scale = match unit {
                'i' => MINUTE,
                'h' => HOUR,
                'd' => DAY,
                'w' => 7.0 * DAY,
                'm' => 30.0 * DAY,
                'y' => 365.0 * DAY,
                _ => return Err(PlotError::InvalidTime(format!("bad relative unit: {}", s))),
            };
            return Ok(end - amount * scale);
        }
    }
    parse_absolute_or_numeric(s, tz)
}

fn parse_absolute_or_numeric(s: &str, tz: &TimeZoneSpec) -> PlotResult<f64> {
    let all_digits = !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if all_digits && matches!(s.len(), 8 | 12 | 14 | 17) {
        let local = parse_compact_datetime(s)?;
        return Ok(datetime_to_j2k(&local) - tz.offset_seconds);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PlotError::InvalidTime(format!("unrecognized time: {}", s))),
    }
}

/// Parse `yyyyMMdd[HHmm[ss[SSS]]]` as a wall-clock time, returned as if UTC.
fn parse_compact_datetime(s: &str) -> PlotResult<DateTime<Utc>> {
    let field = |range: std::ops::Range<usize>| -> u32 {
        s.get(range).and_then(|v| v.parse().ok()).unwrap_or(0)
    };
    let year = s
        .get(0..4)
        .and_then(|v| v.parse::<i32>().ok())
        .ok_or_else(|| PlotError::InvalidTime(s.to_string()))?;

    let date = NaiveDate::from_ymd_opt(year, field(4..6), field(6..8))
        .ok_or_else(|| PlotError::InvalidTime(format!("bad date: {}", s)))?;
    let naive = date
        .and_hms_milli_opt(field(8..10), field(10..12), field(12..14), field(14..17))
        .ok_or_else(|| PlotError::InvalidTime(format!("bad time of day: {}", s)))?;
    Ok(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_is_zero() {
        let epoch = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(datetime_to_j2k(&epoch), 0.0);
        assert_eq!(j2k_to_datetime(0.0), Some(epoch));
    }

    #[test]
    fn test_compact_datetime_in_utc() {
        let tz = TimeZoneSpec::utc();
        assert_eq!(parse_end_time("20000102", &tz, 0.0).unwrap(), 43_200.0);
        assert_eq!(parse_end_time("200001021300", &tz, 0.0).unwrap(), 46_800.0);
        assert_eq!(parse_end_time("20000102130001500", &tz, 0.0).unwrap(), 46_801.5);
    }

    #[test]
    fn test_compact_datetime_in_offset_zone() {
        let tz = TimeZoneSpec::parse("-10").unwrap();
        // Midnight HST is 10:00 UTC.
        assert_eq!(parse_end_time("20000102", &tz, 0.0).unwrap(), 43_200.0 + 36_000.0);
    }

    #[test]
    fn test_numeric_and_now() {
        let tz = TimeZoneSpec::utc();
        assert_eq!(parse_end_time("86400", &tz, 5.0).unwrap(), 86_400.0);
        assert_eq!(parse_end_time("N", &tz, 5.0).unwrap(), 5.0);
        assert_eq!(parse_end_time("now", &tz, 5.0).unwrap(), 5.0);
    }

    #[test]
    fn test_eight_digits_read_as_date() {
        let tz = TimeZoneSpec::utc();
        // 31536000 is not a valid yyyyMMdd; the decimal form is J2K seconds.
        assert!(parse_end_time("31536000", &tz, 0.0).is_err());
        assert_eq!(parse_end_time("31536000.0", &tz, 0.0).unwrap(), 31_536_000.0);
    }

    #[test]
    fn test_relative_start() {
        let tz = TimeZoneSpec::utc();
        assert_eq!(parse_start_time("-2h", 10_000.0, &tz).unwrap(), 2_800.0);
        assert_eq!(parse_start_time("-1d", 86_400.0, &tz).unwrap(), 0.0);
        assert_eq!(parse_start_time("-1.5i", 90.0, &tz).unwrap(), 0.0);
        assert!(parse_start_time("-3q", 0.0, &tz).is_err());
    }

    #[test]
    fn test_negative_numeric_start() {
        let tz = TimeZoneSpec::utc();
        assert_eq!(parse_start_time("-3600", 0.0, &tz).unwrap(), -3_600.0);
    }

    #[test]
    fn test_range_requires_start_before_end() {
        let tz = TimeZoneSpec::utc();
        assert!(TimeRange::parse("100", Some("100"), &tz, 0.0).is_err());
        assert!(TimeRange::parse("200", Some("100"), &tz, 0.0).is_err());
        let r = TimeRange::parse("0", Some("86400"), &tz, 0.0).unwrap();
        assert_eq!(r.duration(), 86_400.0);
    }

    #[test]
    fn test_time_zone_forms() {
        assert_eq!(TimeZoneSpec::parse("GMT").unwrap().offset_seconds, 0.0);
        assert_eq!(TimeZoneSpec::parse("-10").unwrap().offset_seconds, -36_000.0);
        assert_eq!(TimeZoneSpec::parse("+05:30").unwrap().offset_seconds, 19_800.0);
        assert_eq!(TimeZoneSpec::parse("-03:30").unwrap().offset_seconds, -12_600.0);
        assert_eq!(TimeZoneSpec::parse("-10").unwrap().name, "UTC-10:00");
        assert!(TimeZoneSpec::parse("Mars/Olympus").is_err());
        assert!(TimeZoneSpec::parse("+20").is_err());
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(0.0), "2000-01-01");
        assert_eq!(format_date(43_200.0), "2000-01-02");
    }

    #[test]
    fn test_unrepresentable_times() {
        assert_eq!(j2k_to_datetime(1e18), None);
        assert_eq!(j2k_to_datetime(-1e18), None);
        assert_eq!(format_date(1e18), "?");
        assert_eq!(format_timestamp(f64::MAX), "?");

        let tz = TimeZoneSpec::utc();
        assert!(matches!(
            TimeRange::parse("1e17", Some("1e18"), &tz, 0.0),
            Err(PlotError::InvalidTime(_))
        ));
        assert!(TimeRange::parse("-1e12y", Some("0"), &tz, 0.0).is_err());
    }
}
