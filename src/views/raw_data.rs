use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::info;

use super::{format_time, load_topics, poll_query, ViewOptions};
use crate::{
    backend::{models::SensorReading, ApiClient},
    breach::{annotate, Cell, Parameter},
    paginated::{PageNav, PaginatedQuery, Snapshot},
    poller::Poller,
    threshold_cache::{ThresholdCache, Thresholds},
};

/// Paginated table of stored readings with live breach highlighting.
///
/// Thresholds are fetched once on mount. If that fails the table still
/// renders, just without highlighting.
pub struct RawDataView {
    query: Arc<PaginatedQuery<SensorReading, ApiClient>>,
    thresholds: ThresholdCache,
    topics: Vec<String>,
    poller: Poller,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub time: String,
    pub topic: String,
    /// In [`Parameter::ALL`] order.
    pub cells: [Cell; 5],
}

impl RawRow {
    pub fn has_breach(&self) -> bool {
        self.cells.iter().any(|c| c.breach)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDataTable {
    pub heading: String,
    /// `"Temperature (°C)"` etc.
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
    pub nav: PageNav,
}

impl RawDataView {
    pub async fn mount(client: ApiClient, options: ViewOptions) -> Self {
        info!(page_size = options.page_size, filters = ?options.filters, "Mounting raw data view");
        let thresholds = ThresholdCache::new();
        // Errors are logged by the cache; an empty snapshot never breaches.
        let _ = thresholds.load(&client).await;

        let query = Arc::new(PaginatedQuery::with_filters(
            "raw-data",
            client.clone(),
            options.page_size,
            options.filters,
        ));
        let poller = poll_query("raw-data", options.poll_interval, &query);
        let topics = load_topics(&client).await;

        Self {
            query,
            thresholds,
            topics,
            poller,
        }
    }

    pub fn query(&self) -> &PaginatedQuery<SensorReading, ApiClient> {
        &self.query
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub async fn thresholds(&self) -> Arc<Thresholds> {
        self.thresholds.snapshot().await
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<SensorReading>> {
        self.query.subscribe()
    }

    /// `None` until the first page has loaded.
    pub async fn render(&self) -> Option<RawDataTable> {
        let page = self.query.snapshot()?;
        let thresholds = self.thresholds.snapshot().await;
        let rows = annotate(&page.items, &thresholds)
            .into_iter()
            .map(|a| RawRow {
                id: a.reading.id,
                timestamp: a.reading.timestamp,
                time: format_time(a.reading.timestamp),
                topic: a.reading.topic.clone(),
                cells: a.cells,
            })
            .collect();

        Some(RawDataTable {
            heading: format!("Sensor Readings ({})", page.total),
            columns: Parameter::ALL
                .iter()
                .map(|p| {
                    let d = p.descriptor();
                    format!("{} ({})", d.label, d.unit)
                })
                .collect(),
            rows,
            nav: PageNav::new(&page),
        })
    }

    pub async fn unmount(self) {
        self.query.close();
        self.poller.stop().await;
        info!("Raw data view unmounted");
    }
}
