//! Business logic services

pub mod memory;
pub mod redis;
pub mod store;
pub mod visitor;
pub mod visits;

use std::sync::Arc;

use crate::{
    config::{AppConfig, StoreBackend},
    error::AppResult,
};

use self::store::VisitStore;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub visits: visits::VisitTracker,
}

impl Services {
    /// Build services on top of an already connected store
    pub fn new(store: Arc<dyn VisitStore>, config: &AppConfig) -> Self {
        Self {
            visits: visits::VisitTracker::new(store, &config.visits),
        }
    }

    /// Connect the store selected by `visits.backend`
    pub async fn connect(config: &AppConfig) -> AppResult<Self> {
        let store: Arc<dyn VisitStore> = match config.visits.backend {
            StoreBackend::Redis => Arc::new(redis::RedisService::new(&config.redis).await?),
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory visit store, counts are lost on restart");
                Arc::new(memory::MemoryStore::new())
            }
        };
        Ok(Self::new(store, config))
    }
}
