//! Shared application state
//!
//! The scheduler (`rcommerce_core::jobs::Scheduler`) already owns the job
//! store and dispatch queue backends; `AppState` just carries a handle to
//! it through Axum's extractor machinery. Kept generic over the backend
//! types so routes can be exercised against `InMemoryJobStore`/
//! `InMemoryDispatchQueue` in tests without a real Postgres/Redis.

use std::sync::Arc;

use rcommerce_core::jobs::clock::{Clock, SystemClock};
use rcommerce_core::jobs::queue::{DispatchQueueBackend, RedisDispatchQueue};
use rcommerce_core::jobs::store::{JobStoreBackend, PostgresJobStore};
use rcommerce_core::jobs::Scheduler;

pub struct AppState<S = PostgresJobStore, Q = RedisDispatchQueue, C = SystemClock>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    pub scheduler: Arc<Scheduler<S, Q, C>>,
}

impl<S, Q, C> AppState<S, Q, C>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    pub fn new(scheduler: Arc<Scheduler<S, Q, C>>) -> Self {
        Self { scheduler }
    }
}

impl<S, Q, C> Clone for AppState<S, Q, C>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    fn clone(&self) -> Self {
        Self { scheduler: self.scheduler.clone() }
    }
}
