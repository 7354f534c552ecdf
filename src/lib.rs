//! Client-side sync and breach evaluation for the sensor hub dashboard.
//!
//! [`backend::ApiClient`] talks to the REST backend, [`paginated`] and
//! [`poller`] keep each view's data fresh, and [`breach`] highlights readings
//! that fall outside the current thresholds.

pub mod backend;
pub mod breach;
pub mod config;
pub mod paginated;
pub mod poller;
pub mod threshold_cache;
pub mod views;

#[cfg(test)]
mod test_support;

pub use backend::{errors::ApiError, ApiClient};
pub use config::Config;
