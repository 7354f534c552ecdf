//! In-process fake of the sensor backend for client and view tests.

use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};

use crate::backend::models::{Alert, SensorReading, Severity, ThresholdRange};

type Params = Query<HashMap<String, String>>;
type Reply = Result<Json<Value>, StatusCode>;

#[derive(Default)]
struct Shared {
    readings: Mutex<Vec<SensorReading>>,
    alerts: Mutex<Vec<Alert>>,
    thresholds: Mutex<Option<Value>>,
    fail_with: Mutex<Option<StatusCode>>,
    delay: Mutex<Duration>,
    requests: Mutex<Vec<String>>,
}

impl Shared {
    /// Record the request, apply the configured latency and failure.
    async fn gate(&self, uri: &Uri) -> Result<(), StatusCode> {
        self.requests.lock().unwrap().push(uri.to_string());
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match *self.fail_with.lock().unwrap() {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

pub(crate) struct FakeBackend {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let shared = Arc::new(Shared::default());
        let app = Router::new()
            .route("/api/sensor-data/", get(sensor_data))
            .route("/api/sensor-data/latest", get(latest))
            .route("/api/sensor-data/stats", get(stats))
            .route("/api/sensor-data/thresholds", get(thresholds))
            .route("/api/sensor-data/topics", get(topics))
            .route("/api/alerts/", get(alerts))
            .route("/api/alerts/recent", get(recent_alerts))
            .route("/api/alerts/count", get(alert_counts))
            .with_state(shared.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            shared,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn set_readings(&self, readings: Vec<SensorReading>) {
        *self.shared.readings.lock().unwrap() = readings;
    }

    pub fn set_alerts(&self, alerts: Vec<Alert>) {
        *self.shared.alerts.lock().unwrap() = alerts;
    }

    pub fn set_thresholds(&self, body: Value) {
        *self.shared.thresholds.lock().unwrap() = Some(body);
    }

    pub fn fail_with(&self, status: Option<StatusCode>) {
        *self.shared.fail_with.lock().unwrap() = status;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.shared.delay.lock().unwrap() = delay;
    }

    /// Path and query of the most recent request.
    pub fn last_request(&self) -> Option<String> {
        self.shared.requests.lock().unwrap().last().cloned()
    }

    pub fn requests(&self) -> Vec<String> {
        self.shared.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Wait until the published value satisfies `ready`.
pub(crate) async fn next_snapshot<T>(
    rx: &mut watch::Receiver<Option<Arc<T>>>,
    ready: impl Fn(&T) -> bool,
) -> Arc<T> {
    let wait = async {
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(value) = current.filter(|v| ready(v)) {
                return value;
            }
            rx.changed().await.unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for snapshot")
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

/// Reading `id` on `topic`; higher ids are newer. Other parameters sit
/// comfortably inside the default thresholds.
pub(crate) fn reading(id: i64, topic: &str, temperature: f64) -> SensorReading {
    SensorReading {
        id,
        topic: topic.to_owned(),
        timestamp: base_time() + chrono::Duration::minutes(id),
        temperature: Some(temperature),
        humidity: Some(45.0),
        voltage: Some(230.0),
        current: Some(12.0),
        pressure: Some(1010.0),
    }
}

pub(crate) fn alert(id: i64, topic: &str, severity: Severity) -> Alert {
    Alert {
        id,
        sensor_data_id: Some(id * 10),
        timestamp: base_time() + chrono::Duration::minutes(id),
        topic: topic.to_owned(),
        severity,
        violated_keys: vec!["temperature".to_owned()],
        actual_values: BTreeMap::from([("temperature".to_owned(), 85.0)]),
        threshold_values: BTreeMap::from([(
            "temperature".to_owned(),
            ThresholdRange { min: -10.0, max: 60.0 },
        )]),
    }
}

fn default_thresholds() -> Value {
    json!({
        "thresholds": {
            "temperature": {"min": -10.0, "max": 60.0},
            "humidity": {"min": 10.0, "max": 90.0},
            "voltage": {"min": 180.0, "max": 260.0},
            "current": {"min": 0.0, "max": 30.0},
            "pressure": {"min": 950.0, "max": 1050.0}
        }
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn paginate<T: serde::Serialize>(mut rows: Vec<T>, params: &HashMap<String, String>) -> Value {
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let page_size: usize = params
        .get("page_size")
        .and_then(|p| p.parse().ok())
        .unwrap_or(20);
    let total = rows.len();
    let start = (page.saturating_sub(1) * page_size).min(total);
    let end = (start + page_size).min(total);
    let items: Vec<T> = rows.drain(start..end).collect();
    json!({
        "items": items,
        "total": total,
        "page": page,
        "page_size": page_size,
        "total_pages": if total == 0 { 0 } else { total.div_ceil(page_size) },
    })
}

fn in_window(ts: DateTime<Utc>, params: &HashMap<String, String>) -> bool {
    let parse = |k: &str| {
        params
            .get(k)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|t| t.with_timezone(&Utc))
    };
    parse("start_time").map_or(true, |s| ts >= s) && parse("end_time").map_or(true, |e| ts <= e)
}

async fn sensor_data(State(s): State<Arc<Shared>>, uri: Uri, Query(params): Params) -> Reply {
    s.gate(&uri).await?;
    let mut rows: Vec<SensorReading> = s
        .readings
        .lock()
        .unwrap()
        .iter()
        .filter(|r| params.get("topic").map_or(true, |t| &r.topic == t))
        .filter(|r| in_window(r.timestamp, &params))
        .cloned()
        .collect();
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(Json(paginate(rows, &params)))
}

async fn latest(State(s): State<Arc<Shared>>, uri: Uri) -> Reply {
    s.gate(&uri).await?;
    let mut by_topic: BTreeMap<String, SensorReading> = BTreeMap::new();
    for r in s.readings.lock().unwrap().iter() {
        let keep = by_topic.get(&r.topic).map_or(true, |cur| r.id > cur.id);
        if keep {
            by_topic.insert(r.topic.clone(), r.clone());
        }
    }
    Ok(Json(json!(by_topic.into_values().collect::<Vec<_>>())))
}

async fn stats(State(s): State<Arc<Shared>>, uri: Uri) -> Reply {
    s.gate(&uri).await?;
    let readings = s.readings.lock().unwrap();
    let mut topic_counts: BTreeMap<&str, u64> = BTreeMap::new();
    for r in readings.iter() {
        *topic_counts.entry(r.topic.as_str()).or_default() += 1;
    }
    let latest = readings.iter().map(|r| r.timestamp).max();
    Ok(Json(json!({
        "total_messages": readings.len(),
        "total_topics": topic_counts.len(),
        "topic_counts": topic_counts,
        "latest_timestamp": latest,
    })))
}

async fn thresholds(State(s): State<Arc<Shared>>, uri: Uri) -> Reply {
    s.gate(&uri).await?;
    let body = s.thresholds.lock().unwrap().clone();
    Ok(Json(body.unwrap_or_else(default_thresholds)))
}

async fn topics(State(s): State<Arc<Shared>>, uri: Uri) -> Reply {
    s.gate(&uri).await?;
    let mut topics: Vec<String> = s
        .readings
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.topic.clone())
        .collect();
    topics.sort();
    topics.dedup();
    Ok(Json(json!(topics)))
}

async fn alerts(State(s): State<Arc<Shared>>, uri: Uri, Query(params): Params) -> Reply {
    s.gate(&uri).await?;
    let mut rows: Vec<Alert> = s
        .alerts
        .lock()
        .unwrap()
        .iter()
        .filter(|a| params.get("topic").map_or(true, |t| &a.topic == t))
        .filter(|a| params.get("severity").map_or(true, |sev| a.severity.as_str() == sev))
        .filter(|a| in_window(a.timestamp, &params))
        .cloned()
        .collect();
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(Json(paginate(rows, &params)))
}

async fn recent_alerts(State(s): State<Arc<Shared>>, uri: Uri, Query(params): Params) -> Reply {
    s.gate(&uri).await?;
    let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(10);
    let mut rows = s.alerts.lock().unwrap().clone();
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    rows.truncate(limit);
    Ok(Json(json!(rows)))
}

async fn alert_counts(State(s): State<Arc<Shared>>, uri: Uri) -> Reply {
    s.gate(&uri).await?;
    let alerts = s.alerts.lock().unwrap();
    let critical = alerts.iter().filter(|a| a.severity == Severity::Critical).count();
    Ok(Json(json!({
        "total_alerts": alerts.len(),
        "critical_count": critical,
        "warning_count": alerts.len() - critical,
    })))
}
