use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::format_time;
use crate::{
    backend::{
        errors::ApiError,
        models::{AlertCounts, SensorReading, Stats},
        ApiClient,
    },
    breach::{AnnotatedReading, Cell},
    poller::Poller,
    threshold_cache::{ThresholdCache, Thresholds},
};

/// Everything one dashboard refresh fetched, captured together.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub stats: Stats,
    pub latest: Vec<SensorReading>,
    pub alert_counts: AlertCounts,
    pub thresholds: Arc<Thresholds>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCard {
    pub label: &'static str,
    pub value: u64,
}

/// Latest reading of one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorCard {
    pub name: String,
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub time: String,
    pub cells: [Cell; 5],
}

impl SensorCard {
    pub fn has_breach(&self) -> bool {
        self.cells.iter().any(|c| c.breach)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub cards: [StatCard; 4],
    pub sensors: Vec<SensorCard>,
}

impl DashboardSummary {
    pub fn new(snapshot: &DashboardSnapshot) -> Self {
        let cards = [
            StatCard {
                label: "Total Messages",
                value: snapshot.stats.total_messages,
            },
            StatCard {
                label: "Active Topics",
                value: snapshot.stats.total_topics,
            },
            StatCard {
                label: "Total Alerts",
                value: snapshot.alert_counts.total_alerts,
            },
            StatCard {
                label: "Critical Alerts",
                value: snapshot.alert_counts.critical_count,
            },
        ];
        let sensors = snapshot
            .latest
            .iter()
            .map(|r| {
                let annotated = AnnotatedReading::new(r, &snapshot.thresholds);
                SensorCard {
                    name: topic_display_name(&r.topic),
                    topic: r.topic.clone(),
                    timestamp: r.timestamp,
                    time: format_time(r.timestamp),
                    cells: annotated.cells,
                }
            })
            .collect();
        Self { cards, sensors }
    }

    pub fn breached_sensors(&self) -> impl Iterator<Item = &SensorCard> {
        self.sensors.iter().filter(|s| s.has_breach())
    }
}

/// `sensor/plant1/cold_storage` → `cold storage`.
pub fn topic_display_name(topic: &str) -> String {
    topic
        .rsplit('/')
        .next()
        .unwrap_or(topic)
        .replace('_', " ")
}

struct DashboardState {
    client: ApiClient,
    thresholds: ThresholdCache,
    snapshot: watch::Sender<Option<Arc<DashboardSnapshot>>>,
    alive: AtomicBool,
    failures: AtomicU64,
}

impl DashboardState {
    /// Fetch all four resources together. Any failure keeps the previous
    /// snapshot untouched.
    async fn refresh(&self) -> Result<(), ApiError> {
        let client = &self.client;
        let fetched = tokio::try_join!(
            client.stats(),
            client.latest_readings(),
            client.alert_counts(),
            client.thresholds()
        );
        let (stats, latest, alert_counts, thresholds) = match fetched {
            Ok(parts) => parts,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Dashboard refresh failed; keeping previous snapshot");
                return Err(e);
            }
        };

        if !self.alive.load(Ordering::Acquire) {
            debug!("Dashboard unmounted; dropping response");
            return Ok(());
        }

        self.thresholds.replace(thresholds).await;
        let snapshot = DashboardSnapshot {
            stats,
            latest,
            alert_counts,
            thresholds: self.thresholds.snapshot().await,
        };
        self.snapshot.send_if_modified(|current| {
            if current.as_deref() == Some(&snapshot) {
                return false;
            }
            *current = Some(Arc::new(snapshot));
            true
        });
        Ok(())
    }
}

/// Summary cards plus the latest reading of every sensor, refreshed on a
/// timer together with the thresholds used to highlight breaches.
pub struct DashboardView {
    state: Arc<DashboardState>,
    poller: Poller,
}

impl DashboardView {
    pub fn mount(client: ApiClient, poll_interval: Duration) -> Self {
        info!(interval_ms = poll_interval.as_millis() as u64, "Mounting dashboard");
        let (snapshot, _) = watch::channel(None);
        let state = Arc::new(DashboardState {
            client,
            thresholds: ThresholdCache::new(),
            snapshot,
            alive: AtomicBool::new(true),
            failures: AtomicU64::new(0),
        });

        let s = state.clone();
        let poller = Poller::builder("dashboard")
            .interval(poll_interval)
            .start(move || {
                let s = s.clone();
                async move {
                    let _ = s.refresh().await;
                }
            });

        Self { state, poller }
    }

    pub fn snapshot(&self) -> Option<Arc<DashboardSnapshot>> {
        self.state.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<DashboardSnapshot>>> {
        self.state.snapshot.subscribe()
    }

    pub fn thresholds(&self) -> &ThresholdCache {
        &self.state.thresholds
    }

    pub fn failure_count(&self) -> u64 {
        self.state.failures.load(Ordering::Relaxed)
    }

    /// `None` until the first refresh has succeeded.
    pub fn render(&self) -> Option<DashboardSummary> {
        self.snapshot().map(|s| DashboardSummary::new(&s))
    }

    pub async fn unmount(self) {
        self.state.alive.store(false, Ordering::Release);
        self.poller.stop().await;
        info!("Dashboard unmounted");
    }
}
