// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for calendar dates and month arithmetic.

use chrono::{Datelike, Months, NaiveDate};

/// Longest range a single occupancy query may cover.
pub const MAX_RANGE_DAYS: i64 = 120;

/// Format a date as ISO `yyyy-MM-dd`.
///
/// Stored dates use this form so lexicographic order equals calendar order.
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// First and last day of the calendar month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first);
    (first, last)
}

/// Parse a `yyyy-MM` month into its first day.
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").ok()
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting inverted or oversized spans.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if end < start {
            return Err("'to' must not be before 'from'".to_string());
        }
        if (end - start).num_days() >= MAX_RANGE_DAYS {
            return Err(format!("Range must cover fewer than {} days", MAX_RANGE_DAYS));
        }
        Ok(Self { start, end })
    }

    /// The whole calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let (start, end) = month_bounds(date);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// ISO string bounds, for stores that compare dates as strings.
    pub fn iso_bounds(&self) -> (String, String) {
        (iso_date(self.start), iso_date(self.end))
    }
}
