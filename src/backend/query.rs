use chrono::{DateTime, SecondsFormat, Utc};

use super::models::Severity;

/// Optional constraints shared by the list endpoints.
///
/// `None` means "no constraint". Blank topics are normalised to `None` so an
/// empty string never reaches the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub topic: Option<String>,
    pub severity: Option<Severity>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// A single-field filter update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    Topic(Option<String>),
    Severity(Option<Severity>),
    StartTime(Option<DateTime<Utc>>),
    EndTime(Option<DateTime<Utc>>),
}

impl FilterChange {
    /// Topic change from raw user input; blank input clears the filter.
    pub fn topic(raw: impl Into<String>) -> Self {
        Self::Topic(non_blank(raw.into()))
    }
}

impl Filters {
    pub fn apply(&mut self, change: FilterChange) {
        match change {
            FilterChange::Topic(topic) => self.topic = topic.and_then(non_blank),
            FilterChange::Severity(severity) => self.severity = severity,
            FilterChange::StartTime(t) => self.start_time = t,
            FilterChange::EndTime(t) => self.end_time = t,
        }
    }

    pub fn with(mut self, change: FilterChange) -> Self {
        self.apply(change);
        self
    }
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Parameters of one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub page_size: u32,
    pub filters: Filters,
}

impl ListQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            filters: Filters::default(),
        }
    }

    /// Query-string pairs in a stable order. `page` and `page_size` are
    /// always present; unset filters are omitted.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        let f = &self.filters;
        if let Some(topic) = f.topic.as_deref().filter(|t| !t.trim().is_empty()) {
            pairs.push(("topic", topic.to_owned()));
        }
        if let Some(severity) = f.severity {
            pairs.push(("severity", severity.as_str().to_owned()));
        }
        if let Some(t) = f.start_time {
            pairs.push(("start_time", iso8601(t)));
        }
        if let Some(t) = f.end_time {
            pairs.push(("end_time", iso8601(t)));
        }
        pairs
    }
}

fn iso8601(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}
