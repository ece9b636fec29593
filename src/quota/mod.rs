//! Rate & Quota Guard (spec §4.N): per-IP request throttling plus
//! per-user page quotas with one-shot incentive grants.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use uuid::Uuid;

use crate::error::QuotaError;
use crate::store::Repository;

type IpLimiter = RateLimiter<std::net::IpAddr, DefaultKeyedStateStore<std::net::IpAddr>, DefaultClock>;

/// Per-IP request-rate layer plus the per-user page-quota layer from
/// spec §4.N, composed behind one guard so handlers check both without
/// knowing which backing store each uses.
pub struct QuotaGuard {
    ip_limiter: IpLimiter,
    store: Arc<Repository>,
}

impl QuotaGuard {
    /// `requests_per_minute` bounds the per-IP layer; the page-quota
    /// layer reads/writes `users.pages_used`/`pages_limit` directly.
    pub fn new(store: Arc<Repository>, requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute.max(1)).unwrap());
        Self {
            ip_limiter: RateLimiter::keyed(quota),
            store,
        }
    }

    /// Layer (1): per-IP request rate. Returns `Err(RateLimited)` with a
    /// retry-after duration on the window boundary.
    pub fn check_ip(&self, ip: std::net::IpAddr) -> Result<(), QuotaError> {
        self.ip_limiter.check_key(&ip).map_err(|not_until| {
            let retry_after = not_until.wait_time_from(governor::clock::Clock::now(&DefaultClock::default()));
            QuotaError::RateLimited { retry_after }
        })
    }

    /// Layer (2): per-user page quota. Rejects ingestion early when
    /// `pages_used + estimated_pages > pages_limit` (spec §4.F step 4).
    pub async fn check_pages(&self, owner_id: Uuid, estimated_pages: i64) -> Result<(), QuotaError> {
        let (pages_used, pages_limit) = self.store.documents_due_for_quota_check(owner_id).await?;
        if pages_used + estimated_pages > pages_limit {
            return Err(QuotaError::PagesExceeded { pages_used, pages_limit });
        }
        Ok(())
    }
}

/// One-shot, idempotent-per-`(user, task_type)` page grant (spec §4.N's
/// "incentive tasks"). Persistence lives in the `incentive_tasks` table;
/// a unique `(user_id, task_type)` primary key makes the grant
/// naturally idempotent — a second claim is a no-op, not an error.
#[derive(Debug, Clone)]
pub struct IncentiveTask {
    pub task_type: String,
    pub pages_granted: i64,
}

impl QuotaGuard {
    /// Grants `task.pages_granted` additional `pages_limit` to `user_id`
    /// unless that `(user_id, task_type)` pair has already claimed the
    /// task — idempotency is enforced by the table's primary key rather
    /// than an application-level check.
    pub async fn grant_incentive(&self, user_id: Uuid, task: &IncentiveTask) -> Result<bool, QuotaError> {
        self.store
            .grant_incentive_task(user_id, &task.task_type, task.pages_granted)
            .await
            .map_err(QuotaError::from)
    }
}
