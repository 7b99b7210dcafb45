use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    cache::{CachedSlice, ChartCache},
    error::Result,
    query::ChartDataQuery,
    response::ChartDataResponse,
};

/// How the cache was brought in line with a confirmed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The cached slice was filtered in place
    Updated { version: u64 },
    /// The slice could not be updated safely and was fetched again
    Refetched,
}

/// Applies confirmed deletions to the cached slice of one query
#[derive(Clone)]
pub struct CacheReconciler {
    query: ChartDataQuery,
}

impl CacheReconciler {
    pub fn new(query: ChartDataQuery) -> Self {
        Self { query }
    }

    fn cache(&self) -> &Arc<dyn ChartCache> {
        self.query.cache()
    }

    /// Removes `resource_id` from the cached field, or refetches the field when the cached
    /// slice is missing, stale, lacks the field or holds a scalar value.
    ///
    /// When the refetch fails the slice is marked stale and the error is returned.
    pub async fn reconcile_deletion(&self, resource_id: &str) -> Result<Reconciliation> {
        let key = self.query.key();
        let field = self.query.field();
        let target = resource_id.to_string();

        let written = self
            .cache()
            .set(
                key,
                Box::new(move |current: Option<&CachedSlice>| -> Option<ChartDataResponse> {
                    let slice = current.filter(|slice| !slice.stale)?;
                    let filtered = slice.data.get(field)?.without_resource(&target)?;
                    Some(slice.data.with_field(filtered))
                }),
            )
            .await?;

        if let Some(slice) = written {
            debug!(
                "Removed {} from cached {} (version {})",
                resource_id, key, slice.version
            );
            return Ok(Reconciliation::Updated {
                version: slice.version,
            });
        }

        info!(
            "Cached {} cannot be updated in place, refetching after deletion of {}",
            key, resource_id
        );
        match self.query.refetch().await {
            Ok(_) => Ok(Reconciliation::Refetched),
            Err(e) => {
                warn!("Refetch of {} failed, marking it stale: {}", key, e);
                if let Err(invalidate_error) = self.cache().invalidate(key).await {
                    warn!("Could not mark {} stale: {}", key, invalidate_error);
                }
                Err(e)
            }
        }
    }
}
