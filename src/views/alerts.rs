use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::info;

use super::{format_time, load_topics, poll_query, ViewOptions};
use crate::{
    backend::{
        models::{Alert, Severity},
        ApiClient,
    },
    paginated::{PageNav, PaginatedQuery, Snapshot},
    poller::Poller,
};

/// Paginated, filterable alerts table.
///
/// Severity is shown exactly as the backend stored it. It is not compared
/// with the live thresholds, so it can disagree with the dashboard's breach
/// highlighting for a while.
pub struct AlertsView {
    query: Arc<PaginatedQuery<Alert, ApiClient>>,
    topics: Vec<String>,
    poller: Poller,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViolationCell {
    pub key: String,
    /// Two decimals.
    pub actual: String,
    /// `"min – max"`.
    pub limits: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub time: String,
    pub topic: String,
    pub severity: Severity,
    pub violations: Vec<ViolationCell>,
}

impl AlertRow {
    fn new(alert: &Alert) -> Self {
        let violations = alert
            .violations()
            .into_iter()
            .map(|v| ViolationCell {
                key: v.key.to_owned(),
                actual: format!("{:.2}", v.actual),
                limits: format!("{} – {}", v.limits.min, v.limits.max),
            })
            .collect();
        Self {
            id: alert.id,
            timestamp: alert.timestamp,
            time: format_time(alert.timestamp),
            topic: alert.topic.clone(),
            severity: alert.severity,
            violations,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertsTable {
    pub heading: String,
    pub rows: Vec<AlertRow>,
    pub nav: PageNav,
}

impl AlertsView {
    /// Start polling, then load the topic list for the filter.
    pub async fn mount(client: ApiClient, options: ViewOptions) -> Self {
        info!(page_size = options.page_size, filters = ?options.filters, "Mounting alerts view");
        let query = Arc::new(PaginatedQuery::with_filters(
            "alerts",
            client.clone(),
            options.page_size,
            options.filters,
        ));
        let poller = poll_query("alerts", options.poll_interval, &query);
        let topics = load_topics(&client).await;

        Self {
            query,
            topics,
            poller,
        }
    }

    /// Page and filter controls.
    pub fn query(&self) -> &PaginatedQuery<Alert, ApiClient> {
        &self.query
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<Alert>> {
        self.query.subscribe()
    }

    /// `None` until the first page has loaded.
    pub fn render(&self) -> Option<AlertsTable> {
        let page = self.query.snapshot()?;
        Some(AlertsTable {
            heading: format!("All Alerts ({})", page.total),
            rows: page.items.iter().map(AlertRow::new).collect(),
            nav: PageNav::new(&page),
        })
    }

    pub async fn unmount(self) {
        self.query.close();
        self.poller.stop().await;
        info!("Alerts view unmounted");
    }
}
