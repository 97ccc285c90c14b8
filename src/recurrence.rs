//! Recurrence rule evaluation.
//!
//! Rules are RRULE-lite: a frequency with an interval, optional weekday and
//! day-of-month constraint sets, and an optional `count`/`until` bound. The
//! rule object carries no start of its own; the anchor (the task's `start`)
//! supplies the phase for interval arithmetic, the defaults for unset
//! constraint sets, and the time-of-day of every occurrence.
//!
//! Occurrence membership is decided at date granularity. Monthly rules run
//! in one of two modes: "same day of month" when `byweekday` is empty, or
//! "same ordinal weekday of month" (ordinal taken from the anchor) when it
//! is populated. A period with zero matching days yields zero occurrences,
//! not an error.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Recurrence frequency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

fn default_interval() -> i32 {
    1
}

/// A recurrence specification.
///
/// `byweekday` uses weekday indices 0=Mon..6=Sun; `bymonthday` uses days
/// 1..=31. A rule ends at the first of `until` (absolute instant) or
/// `count` (occurrences consumed from the anchor) that is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub freq: Frequency,

    #[serde(default = "default_interval")]
    pub interval: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub byweekday: Vec<u8>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bymonthday: Vec<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            byweekday: Vec::new(),
            bymonthday: Vec::new(),
            count: None,
            until: None,
        }
    }

    /// Reject rules the evaluator cannot interpret.
    pub fn validate(&self) -> Result<()> {
        if self.interval <= 0 {
            return Err(Error::InvalidRecurrence(format!(
                "interval must be positive, got {}",
                self.interval
            )));
        }
        if let Some(day) = self.byweekday.iter().find(|d| **d > 6) {
            return Err(Error::InvalidRecurrence(format!(
                "weekday index out of range: {day}"
            )));
        }
        if let Some(day) = self.bymonthday.iter().find(|d| **d == 0 || **d > 31) {
            return Err(Error::InvalidRecurrence(format!(
                "day of month out of range: {day}"
            )));
        }
        Ok(())
    }
}

fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// 1-based "nth weekday of the month" ordinal (the 15th is the 3rd).
fn month_ordinal(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

/// Date-level occurrence predicate, ignoring `count`/`until`.
fn matches_date(rule: &RecurrenceRule, anchor: NaiveDate, date: NaiveDate) -> bool {
    if date < anchor {
        return false;
    }
    let interval = i64::from(rule.interval);
    match rule.freq {
        Frequency::Daily => (date - anchor).num_days() % interval == 0,
        Frequency::Weekly => {
            let weeks = (monday_of(date) - monday_of(anchor)).num_days() / 7;
            if weeks % interval != 0 {
                return false;
            }
            if rule.byweekday.is_empty() {
                weekday_index(date) == weekday_index(anchor)
            } else {
                rule.byweekday.contains(&weekday_index(date))
            }
        }
        Frequency::Monthly => {
            if (month_index(date) - month_index(anchor)) % interval != 0 {
                return false;
            }
            if !rule.byweekday.is_empty() {
                // Ordinal-weekday mode: same nth-of-month as the anchor.
                rule.byweekday.contains(&weekday_index(date))
                    && month_ordinal(date) == month_ordinal(anchor)
            } else if !rule.bymonthday.is_empty() {
                rule.bymonthday.contains(&(date.day() as u8))
            } else {
                date.day() == anchor.day()
            }
        }
        Frequency::Yearly => {
            i64::from(date.year() - anchor.year()) % interval == 0
                && date.month() == anchor.month()
                && date.day() == anchor.day()
        }
    }
}

fn occurrence_instant(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

/// Does the rule produce an occurrence on the date of `instant`?
///
/// `anchor` is the series start. Bounded rules check termination: an
/// occurrence past `until`, or beyond the `count` budget consumed from the
/// anchor, does not exist.
pub fn occurs_on(
    rule: &RecurrenceRule,
    anchor: DateTime<Utc>,
    instant: DateTime<Utc>,
) -> Result<bool> {
    rule.validate()?;
    let anchor_date = anchor.date_naive();
    let date = instant.date_naive();
    if !matches_date(rule, anchor_date, date) {
        return Ok(false);
    }
    if let Some(until) = rule.until {
        if occurrence_instant(date, anchor.time()) > until {
            return Ok(false);
        }
    }
    if let Some(count) = rule.count {
        // Count occurrences from the anchor up to and including this date.
        let mut seen: u32 = 0;
        let mut cursor = anchor_date;
        while cursor <= date {
            if matches_date(rule, anchor_date, cursor) {
                seen += 1;
                if seen > count {
                    return Ok(false);
                }
            }
            cursor = cursor + Duration::days(1);
        }
    }
    Ok(true)
}

/// Lazily enumerate occurrence instants within `[range_start, range_end]`.
///
/// The scan starts at the anchor so that `count` is consumed by occurrences
/// falling before the range; only occurrences at or after `range_start` are
/// yielded. Unbounded rules are bounded by the requested range.
pub fn instances_between(
    rule: &RecurrenceRule,
    anchor: DateTime<Utc>,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> Result<RecurrenceIter> {
    rule.validate()?;
    Ok(RecurrenceIter {
        rule: rule.clone(),
        anchor_date: anchor.date_naive(),
        time: anchor.time(),
        cursor: anchor.date_naive(),
        end_date: range_end.date_naive(),
        range_start,
        range_end,
        remaining: rule.count,
    })
}

/// Iterator over occurrences of a rule, produced by [`instances_between`].
pub struct RecurrenceIter {
    rule: RecurrenceRule,
    anchor_date: NaiveDate,
    time: NaiveTime,
    cursor: NaiveDate,
    end_date: NaiveDate,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    remaining: Option<u32>,
}

impl Iterator for RecurrenceIter {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor <= self.end_date {
            let date = self.cursor;
            self.cursor = date + Duration::days(1);

            if !matches_date(&self.rule, self.anchor_date, date) {
                continue;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    return None;
                }
                *remaining -= 1;
            }
            let occurrence = occurrence_instant(date, self.time);
            if let Some(until) = self.rule.until {
                if occurrence > until {
                    return None;
                }
            }
            if occurrence >= self.range_start && occurrence <= self.range_end {
                return Some(occurrence);
            }
        }
        None
    }
}
