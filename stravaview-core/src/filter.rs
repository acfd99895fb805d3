//! Activity selection by date range and activity type.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::{ActivityRecord, ActivityTable, ActivityType};

/// Which activities a chart covers.
///
/// Both date bounds are inclusive and whole-day: `end` includes every
/// activity on that calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub activity_type: Option<ActivityType>,
}

impl ActivityFilter {
    /// A filter that keeps everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            activity_type: None,
        }
    }

    pub fn of_type(mut self, activity_type: ActivityType) -> Self {
        self.activity_type = Some(activity_type);
        self
    }

    fn has_date_bounds(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    pub fn matches(&self, record: &ActivityRecord) -> bool {
        if let Some(wanted) = &self.activity_type {
            if &record.activity_type != wanted {
                return false;
            }
        }

        if !self.has_date_bounds() {
            return true;
        }

        match record.activity_date {
            Some(date) => self.in_range(date),
            None => false,
        }
    }

    fn in_range(&self, date: NaiveDateTime) -> bool {
        let day = date.date();
        self.start.map_or(true, |start| day >= start) && self.end.map_or(true, |end| day <= end)
    }

    /// A new table containing the matching records, order preserved.
    pub fn apply(&self, table: &ActivityTable) -> ActivityTable {
        let filtered = table.retain_where(|r| self.matches(r));
        tracing::debug!(
            before = table.len(),
            after = filtered.len(),
            start = ?self.start,
            end = ?self.end,
            activity_type = ?self.activity_type,
            "Applied activity filter"
        );
        filtered
    }
}
