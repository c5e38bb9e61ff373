// SPDX-License-Identifier: GPL-3.0-only

//! Date range selection for a two-click calendar picker

use crate::fl;
use chrono::NaiveDate;

const LABEL_FORMAT: &str = "%b %d, %Y";

/// Selected range and popover state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRangePicker {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    open: bool,
}

impl DateRangePicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(from: NaiveDate, to: NaiveDate) -> Self {
        let (from, to) = if to < from { (to, from) } else { (from, to) };
        Self {
            from: Some(from),
            to: Some(to),
            open: false,
        }
    }

    pub fn from(&self) -> Option<NaiveDate> {
        self.from
    }

    pub fn to(&self) -> Option<NaiveDate> {
        self.to
    }

    /// Handle a click on a calendar day
    ///
    /// The first click starts a range, the second completes it. A click after
    /// a complete range starts a new one.
    pub fn select_day(&mut self, day: NaiveDate) {
        match (self.from, self.to) {
            (Some(from), None) => {
                if day < from {
                    self.from = Some(day);
                    self.to = Some(from);
                } else {
                    self.to = Some(day);
                }
            }
            _ => {
                self.from = Some(day);
                self.to = None;
            }
        }
    }

    pub fn clear(&mut self) {
        self.from = None;
        self.to = None;
    }

    pub fn is_complete(&self) -> bool {
        self.from.is_some() && self.to.is_some()
    }

    /// Button text for the current selection
    pub fn label(&self) -> String {
        match (self.from, self.to) {
            (Some(from), Some(to)) => format!(
                "{} - {}",
                from.format(LABEL_FORMAT),
                to.format(LABEL_FORMAT)
            ),
            (Some(from), None) => from.format(LABEL_FORMAT).to_string(),
            _ => fl!("date-range-placeholder"),
        }
    }

    /// Whether `day` falls in the selection, bounds included
    pub fn contains(&self, day: NaiveDate) -> bool {
        match (self.from, self.to) {
            (Some(from), Some(to)) => from <= day && day <= to,
            (Some(from), None) => from == day,
            _ => false,
        }
    }

    /// Number of days covered, bounds included
    pub fn len_days(&self) -> u32 {
        match (self.from, self.to) {
            (Some(from), Some(to)) => (to - from).num_days().unsigned_abs() as u32 + 1,
            (Some(_), None) => 1,
            _ => 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub fn toggle(&mut self) {
        self.open = !self.open;
    }
}
