//! Unique daily visit counting

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::{
    config::{DedupStrategy, VisitsConfig},
    error::{AppError, AppResult},
    models::visit::{pending_key, visit_log_key, Visit},
};

use super::store::VisitStore;

/// Presence-only value of a dedup entry
const SENTINEL: &str = "1";

#[derive(Clone)]
pub struct VisitTracker {
    store: Arc<dyn VisitStore>,
    strategy: DedupStrategy,
    log_ttl_secs: u64,
}

impl VisitTracker {
    pub fn new(store: Arc<dyn VisitStore>, config: &VisitsConfig) -> Self {
        Self {
            store,
            strategy: config.dedup,
            log_ttl_secs: config.log_ttl_secs,
        }
    }

    /// Count a visit for today (UTC). Returns `true` if it was the first visit of
    /// `visitor_id` to `blog_id` today.
    pub async fn track(&self, blog_id: &str, visitor_id: &str) -> AppResult<bool> {
        self.track_on(blog_id, visitor_id, Utc::now().date_naive()).await
    }

    /// Count a visit for a given calendar day.
    ///
    /// The dedup entry is always written before the pending counter is bumped: a crash
    /// in between loses the visit instead of counting it twice.
    pub async fn track_on(&self, blog_id: &str, visitor_id: &str, day: NaiveDate) -> AppResult<bool> {
        let log_key = visit_log_key(blog_id, visitor_id, day);

        let first_today = match self.strategy {
            DedupStrategy::Atomic => {
                self.store
                    .set_nx_ex(&log_key, SENTINEL, self.log_ttl_secs)
                    .await?
            }
            DedupStrategy::CheckThenSet => {
                if self.store.get(&log_key).await?.is_some() {
                    false
                } else {
                    self.store.set_ex(&log_key, SENTINEL, self.log_ttl_secs).await?;
                    true
                }
            }
        };

        if first_today {
            self.store.incr(&pending_key(blog_id)).await?;
        }
        Ok(first_today)
    }

    /// Fire-and-forget variant of [`track`](Self::track): failures end here
    pub async fn record(&self, visit: &Visit) {
        match self.track(&visit.blog_id, &visit.visitor_id).await {
            Ok(counted) => {
                tracing::debug!(blog_id = %visit.blog_id, counted, "Visit tracked");
            }
            Err(e) => {
                tracing::warn!(blog_id = %visit.blog_id, error = %e, "Visitor track error");
            }
        }
    }

    /// Unique visits counted for `blog_id` and not yet flushed
    pub async fn pending(&self, blog_id: &str) -> AppResult<i64> {
        match self.store.get(&pending_key(blog_id)).await? {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                AppError::Internal(format!("Pending counter for {} is not an integer", blog_id))
            }),
            None => Ok(0),
        }
    }

    /// Readiness probe for the backing store
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
