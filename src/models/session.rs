// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training plan session completion markers.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A planned training session marked as done.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCompletion {
    pub id: i64,
    pub user_id: String,
    pub week_number: u32,
    pub day_of_week: Option<String>,
    pub session_type: String,
    pub completed_at: DateTime<Utc>,
}

/// Unique key of a session completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub week_number: u32,
    pub day_of_week: Option<String>,
    pub session_type: String,
}

impl SessionKey {
    pub fn new(
        user_id: impl Into<String>,
        week_number: u32,
        day_of_week: Option<&str>,
        session_type: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            week_number,
            day_of_week: day_of_week.filter(|d| !d.is_empty()).map(String::from),
            session_type: session_type.into(),
        }
    }

    /// Column value for `day_of_week`. An absent day is stored as the empty
    /// string so the unique index treats it as a single value.
    pub(crate) fn day_column(&self) -> &str {
        self.day_of_week.as_deref().unwrap_or("")
    }
}

/// Result of toggling a session completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Completed(SessionCompletion),
    Incomplete,
}

impl ToggleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ToggleOutcome::Completed(_))
    }
}
