//! Size-budget eviction.
//!
//! Runs after a write pushes the index total over budget and removes the
//! least recently accessed entries until the total is back down to the
//! target (`budget * evict_target_ratio`). Victim sizes are summed as they are
//! removed, so exactly as many entries go as the byte shortfall requires.

use std::collections::HashSet;

use posterframe_core::{CacheEntry, Error};

use super::ImageCache;

/// Candidates pulled from the index per round.
const EVICTION_PAGE: usize = 32;

/// What one eviction pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: usize,
    pub freed_bytes: u64,
    /// Victims whose blob or row could not be deleted; left in place.
    pub failed: usize,
}

impl ImageCache {
    /// Evict least recently used entries if the index total exceeds budget.
    ///
    /// Best effort: failures are logged and skipped, and the resulting total
    /// is not re-checked. A later write triggers another pass if needed.
    pub async fn maybe_evict(&self) -> EvictionReport {
        self.evict_protecting(None).await
    }

    pub(super) async fn evict_protecting(&self, protect: Option<&str>) -> EvictionReport {
        match self.evict(protect).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "eviction aborted");
                EvictionReport::default()
            }
        }
    }

    async fn evict(&self, protect: Option<&str>) -> Result<EvictionReport, Error> {
        let total = self.db.total_size().await?;
        if total <= self.settings.budget_bytes {
            return Ok(EvictionReport::default());
        }

        let to_free = total - self.settings.target_bytes();
        let mut report = EvictionReport::default();

        // URLs never to pick again this pass: the just-written entry and
        // victims that failed to delete.
        let mut skipped: HashSet<String> = protect.map(String::from).into_iter().collect();

        while report.freed_bytes < to_free {
            let candidates = self.db.oldest_accessed(skipped.len() + EVICTION_PAGE).await?;
            let mut progressed = false;

            for victim in candidates {
                if skipped.contains(&victim.url) {
                    continue;
                }
                if report.freed_bytes >= to_free {
                    break;
                }
                progressed = true;

                match self.remove_victim(&victim).await {
                    Removal::Evicted => {
                        report.evicted += 1;
                        report.freed_bytes += victim.size_bytes;
                    }
                    Removal::AlreadyGone => {
                        skipped.insert(victim.url);
                    }
                    Removal::Failed => {
                        report.failed += 1;
                        skipped.insert(victim.url);
                    }
                }
            }

            if !progressed {
                break;
            }
        }

        Ok(report)
    }

    /// Delete one victim's blob, then its row.
    async fn remove_victim(&self, victim: &CacheEntry) -> Removal {
        if !self.blobs.delete(&victim.local_path).await {
            return Removal::Failed;
        }

        match self.db.delete_entry(&victim.url).await {
            Ok(true) => {
                tracing::debug!(url = %victim.url, bytes = victim.size_bytes, "evicted");
                Removal::Evicted
            }
            // Another pass or an invalidation got there first; its bytes are
            // already off the books.
            Ok(false) => Removal::AlreadyGone,
            Err(e) => {
                tracing::warn!(url = %victim.url, error = %e, "failed to drop evicted entry");
                Removal::Failed
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Evicted,
    AlreadyGone,
    Failed,
}
