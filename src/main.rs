use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{signal, sync::watch, task::JoinHandle};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sensorhub_client::{
    backend::models::{Alert, Severity},
    breach::annotate,
    paginated::Snapshot,
    views::{
        dashboard::DashboardSummary, AlertsView, DashboardSnapshot, DashboardView, RawDataView,
        ViewOptions,
    },
    ApiClient, Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; variables may come from the environment
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let client = ApiClient::new(&config)?;
    info!(base_url = %client.base_url(), "Monitoring sensor backend");

    match client.recent_alerts(config.recent_alerts_limit).await {
        Ok(alerts) => {
            for a in &alerts {
                info!(id = a.id, topic = %a.topic, severity = %a.severity, keys = ?a.violated_keys, "Recent alert");
            }
        }
        Err(e) => warn!(error = %e, "Could not fetch recent alerts"),
    }

    let dashboard = DashboardView::mount(client.clone(), config.poll_interval);
    let alerts = AlertsView::mount(client.clone(), ViewOptions::alerts(&config)).await;
    let raw_data = RawDataView::mount(client, ViewOptions::raw_data(&config)).await;
    info!(
        topics = alerts.topics().len(),
        thresholds = raw_data.thresholds().await.len(),
        "Views mounted"
    );

    let loggers = [
        log_dashboard(dashboard.subscribe()),
        log_alerts(alerts.subscribe()),
        log_raw_data(&raw_data).await,
    ];

    shutdown_signal().await;

    for logger in &loggers {
        logger.abort();
    }
    dashboard.unmount().await;
    alerts.unmount().await;
    raw_data.unmount().await;

    Ok(())
}

fn log_dashboard(mut rx: watch::Receiver<Option<Arc<DashboardSnapshot>>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let Some(snapshot) = rx.borrow_and_update().clone() else {
                continue;
            };
            let summary = DashboardSummary::new(&snapshot);
            let cards: Vec<String> = summary
                .cards
                .iter()
                .map(|c| format!("{}={}", c.label, c.value))
                .collect();
            info!(cards = ?cards, sensors = summary.sensors.len(), "Dashboard updated");
            for sensor in summary.breached_sensors() {
                let breached: Vec<String> = sensor
                    .cells
                    .iter()
                    .filter(|c| c.breach)
                    .map(|c| format!("{}={}", c.parameter, c.with_unit()))
                    .collect();
                warn!(sensor = %sensor.name, topic = %sensor.topic, breached = ?breached, "Threshold breach");
            }
        }
    })
}

fn log_alerts(mut rx: watch::Receiver<Snapshot<Alert>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let Some(page) = rx.borrow_and_update().clone() else {
                continue;
            };
            let critical = page
                .items
                .iter()
                .filter(|a| a.severity == Severity::Critical)
                .count();
            info!(
                page = page.page,
                total_pages = page.page_count(),
                total = page.total,
                critical_on_page = critical,
                "Alerts page updated"
            );
        }
    })
}

async fn log_raw_data(view: &RawDataView) -> JoinHandle<()> {
    let mut rx = view.subscribe();
    let thresholds = view.thresholds().await;
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let Some(page) = rx.borrow_and_update().clone() else {
                continue;
            };
            let rows = annotate(&page.items, &thresholds);
            let breaching = rows.iter().filter(|r| r.has_breach()).count();
            info!(
                page = page.page,
                rows = rows.len(),
                breaching,
                "Raw data page updated"
            );
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
