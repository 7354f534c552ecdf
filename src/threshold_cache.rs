use std::{collections::BTreeMap, sync::Arc};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::backend::{errors::ApiError, models::ThresholdRange, ApiClient};

#[derive(Debug, Error, PartialEq)]
#[error("threshold for {parameter:?} is inverted or not a number: min={min}, max={max}")]
pub struct InvalidThreshold {
    pub parameter: String,
    pub min: f64,
    pub max: f64,
}

/// Immutable set of per-parameter limits, keyed by parameter name.
///
/// Every band satisfies `min <= max`; construction rejects anything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thresholds {
    limits: BTreeMap<String, ThresholdRange>,
}

impl TryFrom<BTreeMap<String, ThresholdRange>> for Thresholds {
    type Error = InvalidThreshold;

    fn try_from(limits: BTreeMap<String, ThresholdRange>) -> Result<Self, Self::Error> {
        if let Some((name, r)) = limits.iter().find(|(_, r)| !(r.min <= r.max)) {
            return Err(InvalidThreshold {
                parameter: name.clone(),
                min: r.min,
                max: r.max,
            });
        }
        Ok(Self { limits })
    }
}

impl Thresholds {
    pub fn get(&self, parameter: &str) -> Option<&ThresholdRange> {
        self.limits.get(parameter)
    }

    /// `true` if `value` lies outside the band configured for `parameter`.
    /// Parameters without a configured band are never in breach.
    pub fn is_breach(&self, parameter: &str, value: f64) -> bool {
        self.get(parameter).is_some_and(|band| !band.contains(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ThresholdRange)> {
        self.limits.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

/// Current `Thresholds` snapshot for one view.
///
/// Clones share the same snapshot. A reload swaps the whole `Arc`; readers
/// holding an older snapshot keep a consistent view of it.
#[derive(Clone, Default)]
pub struct ThresholdCache {
    inner: Arc<RwLock<Arc<Thresholds>>>,
}

impl ThresholdCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot wholesale.
    pub async fn replace(&self, thresholds: Thresholds) {
        *self.inner.write().await = Arc::new(thresholds);
    }

    pub async fn snapshot(&self) -> Arc<Thresholds> {
        self.inner.read().await.clone()
    }

    /// Fetch thresholds from the backend and install them.
    ///
    /// On failure the previous snapshot stays in place and the error is
    /// returned to the caller.
    pub async fn load(&self, client: &ApiClient) -> Result<Arc<Thresholds>, ApiError> {
        match client.thresholds().await {
            Ok(thresholds) => {
                info!(parameters = thresholds.len(), "Thresholds loaded");
                let snapshot = Arc::new(thresholds);
                *self.inner.write().await = snapshot.clone();
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load thresholds; keeping previous snapshot");
                Err(e)
            }
        }
    }
}
