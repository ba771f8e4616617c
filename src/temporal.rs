//! Validity intervals of time-bounded edges and the query window they are
//! tested against.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::error::PortalError;

/// Inclusive calendar-date window supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PortalError> {
        if start > end {
            return Err(PortalError::InvalidDate(format!(
                "window start {start} is after window end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, PortalError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// First instant of the start date.
    pub fn start_instant(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    /// Last millisecond of the end date, so the end date is inclusive.
    pub fn end_instant(&self) -> DateTime<Utc> {
        let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Utc.from_utc_datetime(&self.end.and_time(last))
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Validity of a deployment, affiliation or employment edge. A missing bound
/// leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Validity {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Validity {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn open() -> Self {
        Self::default()
    }

    pub fn overlaps(&self, window: &DateWindow) -> bool {
        let starts_in_time = self
            .start
            .map(|start| start <= window.end_instant())
            .unwrap_or(true);
        let ends_in_time = self
            .end
            .map(|end| end >= window.start_instant())
            .unwrap_or(true);
        starts_in_time && ends_in_time
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, PortalError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| PortalError::InvalidDate(value.to_string()))
}

/// Reads an `xsd:dateTime` or `xsd:date` lexical form.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    // xsd:dateTime without a timezone is read as UTC.
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> DateWindow {
        DateWindow::parse("2020-01-01", "2020-12-31").unwrap()
    }

    fn at(value: &str) -> Option<DateTime<Utc>> {
        parse_timestamp(value)
    }

    #[test]
    fn unbounded_edge_always_overlaps() {
        assert!(Validity::open().overlaps(&window()));
        let narrow = DateWindow::parse("1901-05-05", "1901-05-05").unwrap();
        assert!(Validity::open().overlaps(&narrow));
    }

    #[test]
    fn edge_ending_before_window_is_excluded() {
        let edge = Validity::new(None, at("2019-12-31T23:59:59Z"));
        assert!(!edge.overlaps(&window()));
    }

    #[test]
    fn edge_starting_after_window_is_excluded() {
        let edge = Validity::new(at("2021-01-01T00:00:00Z"), None);
        assert!(!edge.overlaps(&window()));
    }

    #[test]
    fn partial_overlaps_are_included() {
        let straddles_start = Validity::new(at("2019-06-01"), at("2020-03-01"));
        let straddles_end = Validity::new(at("2020-12-31T18:00:00Z"), None);
        let encloses = Validity::new(at("2000-01-01"), at("2030-01-01"));
        let touches_start = Validity::new(None, at("2020-01-01T00:00:00Z"));
        for edge in [straddles_start, straddles_end, encloses, touches_start] {
            assert!(edge.overlaps(&window()), "{edge:?}");
        }
    }

    #[test]
    fn reversed_window_is_rejected() {
        assert!(DateWindow::parse("2020-12-31", "2020-01-01").is_err());
    }

    #[test]
    fn timestamps_accept_date_and_naive_forms() {
        assert_eq!(at("2020-01-01"), at("2020-01-01T00:00:00Z"));
        assert_eq!(at("2020-01-01T00:00:00"), at("2020-01-01T00:00:00Z"));
        assert!(at("yesterday").is_none());
    }
}
