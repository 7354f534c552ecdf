use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::backend::{
    models::Severity,
    query::{FilterChange, Filters},
    MAX_RECENT_ALERTS,
};

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the backend REST API, e.g. `http://localhost:8000/api`.
    pub api_base_url: String,
    /// Upper bound for a single request.
    pub request_timeout: Duration,
    /// Refresh period of every view.
    pub poll_interval: Duration,
    pub alerts_page_size: u32,
    pub raw_data_page_size: u32,
    pub recent_alerts_limit: u32,
    /// Filters applied to the alerts and raw-data views on mount.
    pub initial_filters: Filters,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let request_timeout_secs: u64 = optional("REQUEST_TIMEOUT_SECS", "10")
            .parse()
            .context("REQUEST_TIMEOUT_SECS must be a positive integer")?;
        let poll_interval_ms: u64 = optional("POLL_INTERVAL_MS", "5000")
            .parse()
            .context("POLL_INTERVAL_MS must be a positive integer")?;
        if request_timeout_secs == 0 || poll_interval_ms == 0 {
            bail!("REQUEST_TIMEOUT_SECS and POLL_INTERVAL_MS must be greater than zero");
        }

        let recent_alerts_limit: u32 = optional("RECENT_ALERTS_LIMIT", "10")
            .parse()
            .context("RECENT_ALERTS_LIMIT must be a positive integer")?;
        if !(1..=MAX_RECENT_ALERTS).contains(&recent_alerts_limit) {
            bail!("RECENT_ALERTS_LIMIT must be between 1 and {MAX_RECENT_ALERTS}");
        }

        Ok(Self {
            api_base_url: optional("API_BASE_URL", "http://localhost:8000/api"),
            request_timeout: Duration::from_secs(request_timeout_secs),
            poll_interval: Duration::from_millis(poll_interval_ms),
            alerts_page_size: page_size(&optional("ALERTS_PAGE_SIZE", "15"), "ALERTS_PAGE_SIZE")?,
            raw_data_page_size: page_size(
                &optional("RAW_DATA_PAGE_SIZE", "20"),
                "RAW_DATA_PAGE_SIZE",
            )?,
            recent_alerts_limit,
            initial_filters: parse_filters(
                lookup("MONITOR_TOPIC").as_deref(),
                lookup("MONITOR_SEVERITY").as_deref(),
            )?,
        })
    }
}

/// The backend accepts page sizes in `1..=100`.
fn page_size(raw: &str, key: &str) -> Result<u32> {
    let n: u32 = raw
        .parse()
        .with_context(|| format!("{key} must be a positive integer"))?;
    if !(1..=100).contains(&n) {
        bail!("{key} must be between 1 and 100, got {n}");
    }
    Ok(n)
}

/// Empty values mean "no filter".
fn parse_filters(topic: Option<&str>, severity: Option<&str>) -> Result<Filters> {
    let mut filters = Filters::default();
    if let Some(topic) = topic {
        filters.apply(FilterChange::topic(topic.trim()));
    }
    if let Some(raw) = severity.map(str::trim).filter(|s| !s.is_empty()) {
        let severity = raw
            .parse::<Severity>()
            .context("MONITOR_SEVERITY must be 'warning' or 'critical'")?;
        filters.apply(FilterChange::Severity(Some(severity)));
    }
    Ok(filters)
}
