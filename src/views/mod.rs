//! Render models for the three screens. Each view owns its own poller,
//! query state and threshold snapshot; nothing is shared between views.

pub mod alerts;
pub mod dashboard;
pub mod raw_data;

use std::{sync::Arc, time::Duration};

use tracing::warn;

use crate::{
    backend::{query::Filters, ApiClient},
    config::Config,
    paginated::{PageSource, PaginatedQuery},
    poller::Poller,
};

pub use alerts::{AlertRow, AlertsTable, AlertsView};
pub use dashboard::{DashboardSnapshot, DashboardSummary, DashboardView};
pub use raw_data::{RawDataTable, RawDataView, RawRow};

/// Settings for mounting a table view.
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub poll_interval: Duration,
    pub page_size: u32,
    pub filters: Filters,
}

impl ViewOptions {
    pub fn alerts(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            page_size: config.alerts_page_size,
            filters: config.initial_filters.clone(),
        }
    }

    /// Raw data has no severity filter.
    pub fn raw_data(config: &Config) -> Self {
        let mut filters = config.initial_filters.clone();
        filters.severity = None;
        Self {
            poll_interval: config.poll_interval,
            page_size: config.raw_data_page_size,
            filters,
        }
    }
}

/// Drive `query` from a poller that also wakes on page/filter changes.
fn poll_query<T, S>(name: &str, interval: Duration, query: &Arc<PaginatedQuery<T, S>>) -> Poller
where
    T: PartialEq + Send + Sync + 'static,
    S: PageSource<T> + 'static,
{
    let q = query.clone();
    Poller::builder(name)
        .interval(interval)
        .trigger(query.trigger())
        .start(move || {
            let q = q.clone();
            async move {
                // Failures are logged and recorded by the query itself; the
                // next tick is the retry.
                let _ = q.refresh().await;
            }
        })
}

/// Topic names for the filter drop-down. An unavailable backend yields an
/// empty list rather than failing the mount.
async fn load_topics(client: &ApiClient) -> Vec<String> {
    match client.topics().await {
        Ok(mut topics) => {
            topics.sort();
            topics
        }
        Err(e) => {
            warn!(error = %e, "Failed to load topics");
            Vec::new()
        }
    }
}

/// `2024-05-01 10:15:30` in UTC.
pub(crate) fn format_time(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
