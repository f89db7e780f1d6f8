//! Settings shared between a running session and its control surface

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::{DmsError, TrackerConfig};

/// Cloneable handle to the live tracker configuration.
///
/// Writers swap in a whole new validated `TrackerConfig`; readers take an
/// `Arc` snapshot, so a reader never sees fields from two different writes.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    inner: Arc<RwLock<Arc<TrackerConfig>>>,
}

impl SharedSettings {
    /// Create a handle from a validated configuration
    pub fn new(config: TrackerConfig) -> Result<Self, DmsError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        })
    }

    /// Current configuration
    pub fn snapshot(&self) -> Arc<TrackerConfig> {
        // The lock only guards an Arc swap, so a poisoned lock still holds a valid value
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration. Invalid values are rejected and the
    /// previous configuration stays in force.
    pub fn replace(&self, config: TrackerConfig) -> Result<(), DmsError> {
        config.validate()?;
        info!(
            "Tracker settings updated: threshold={} duration={}s markers={:?}",
            config.confidence_threshold, config.alarm_duration_seconds, config.closed_markers
        );
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        Ok(())
    }
}
