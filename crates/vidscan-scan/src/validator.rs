//! Cached path validation.

use std::sync::Arc;

use tracing::debug;
use vidscan_core::{PathValidation, inspect_directory};

use crate::cache::ResultCache;

/// Classifies candidate roots, memoizing outcomes per raw path string.
#[derive(Debug, Clone)]
pub struct PathValidator {
    cache: Arc<ResultCache>,
}

impl PathValidator {
    pub fn new(cache: Arc<ResultCache>) -> Self {
        Self { cache }
    }

    /// Validate `raw` as a scan root.
    ///
    /// A cached outcome younger than the TTL is returned without touching the
    /// filesystem. Rejections are cached as well.
    pub async fn validate(&self, raw: &str) -> PathValidation {
        if let Some(hit) = self.cache.get_validation(raw) {
            debug!("validation cache hit for {raw:?}");
            return hit;
        }

        let outcome = inspect_directory(raw).await;
        if let PathValidation::Invalid { reason, .. } = &outcome {
            debug!("rejected {raw:?}: {}", reason.message());
        }
        self.cache.put_validation(raw, outcome.clone());
        outcome
    }
}
