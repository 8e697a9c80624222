/// Subscription plan limits
///
/// Each church's subscription tier caps how many members and website pages
/// it may hold. Limits are checked before the insert that would exceed them.
///
/// | Tier       | Members   | Pages     |
/// |------------|-----------|-----------|
/// | FREE       | 100       | 3         |
/// | STARTER    | 500       | 10        |
/// | GROWTH     | 2,500     | 50        |
/// | ENTERPRISE | unlimited | unlimited |
///
/// # Example
///
/// ```no_run
/// use churchflow_shared::plan_limits::{LimitedResource, PlanLimitEnforcer};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, church_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let enforcer = PlanLimitEnforcer::new(pool);
/// enforcer.enforce(church_id, LimitedResource::Members).await?;
/// // insert the member...
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::church::{Church, SubscriptionTier};
use crate::models::member::Member;
use crate::models::web_page::WebPage;

#[derive(Debug, thiserror::Error)]
pub enum PlanLimitError {
    #[error("{} limit reached for the {tier:?} plan ({current}/{limit})", resource.as_str())]
    LimitExceeded {
        resource: LimitedResource,
        tier: SubscriptionTier,
        limit: u32,
        current: u32,
    },

    #[error("Church not found: {0}")]
    ChurchNotFound(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitedResource {
    Members,
    Pages,
}

impl LimitedResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitedResource::Members => "Member",
            LimitedResource::Pages => "Website page",
        }
    }
}

/// `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub max_members: Option<u32>,
    pub max_pages: Option<u32>,
}

impl PlanLimits {
    pub fn for_tier(tier: SubscriptionTier) -> Self {
        match tier {
            SubscriptionTier::Free => PlanLimits {
                max_members: Some(100),
                max_pages: Some(3),
            },
            SubscriptionTier::Starter => PlanLimits {
                max_members: Some(500),
                max_pages: Some(10),
            },
            SubscriptionTier::Growth => PlanLimits {
                max_members: Some(2_500),
                max_pages: Some(50),
            },
            SubscriptionTier::Enterprise => PlanLimits {
                max_members: None,
                max_pages: None,
            },
        }
    }

    pub fn get(&self, resource: LimitedResource) -> Option<u32> {
        match resource {
            LimitedResource::Members => self.max_members,
            LimitedResource::Pages => self.max_pages,
        }
    }

    /// True when one more `resource` fits under the limit
    pub fn allows(&self, resource: LimitedResource, current: u32) -> bool {
        self.get(resource).map_or(true, |limit| current < limit)
    }
}

pub struct PlanLimitEnforcer {
    db: PgPool,
}

impl PlanLimitEnforcer {
    pub fn new(db: PgPool) -> Self {
        PlanLimitEnforcer { db }
    }

    /// Fails with `LimitExceeded` when the church is already at its limit
    pub async fn enforce(
        &self,
        church_id: Uuid,
        resource: LimitedResource,
    ) -> Result<(), PlanLimitError> {
        let church = Church::find_by_id(&self.db, church_id)
            .await?
            .ok_or(PlanLimitError::ChurchNotFound(church_id))?;

        let limits = PlanLimits::for_tier(church.subscription_tier);
        let Some(limit) = limits.get(resource) else {
            return Ok(());
        };

        let current = self.count(church_id, resource).await?;
        if !limits.allows(resource, current) {
            tracing::info!(
                church_id = %church_id,
                resource = resource.as_str(),
                current,
                limit,
                "Plan limit reached"
            );
            return Err(PlanLimitError::LimitExceeded {
                resource,
                tier: church.subscription_tier,
                limit,
                current,
            });
        }

        Ok(())
    }

    async fn count(&self, church_id: Uuid, resource: LimitedResource) -> Result<u32, sqlx::Error> {
        let count = match resource {
            LimitedResource::Members => Member::count(&self.db, church_id).await?,
            LimitedResource::Pages => WebPage::count(&self.db, church_id).await?,
        };
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_free() {
        let limits = PlanLimits::for_tier(SubscriptionTier::Free);
        assert_eq!(limits.max_members, Some(100));
        assert_eq!(limits.max_pages, Some(3));
    }

    #[test]
    fn test_limits_grow_with_tier() {
        let tiers = [
            SubscriptionTier::Free,
            SubscriptionTier::Starter,
            SubscriptionTier::Growth,
        ];
        let members: Vec<u32> = tiers
            .iter()
            .filter_map(|t| PlanLimits::for_tier(*t).max_members)
            .collect();
        assert!(members.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_enterprise_unlimited() {
        let limits = PlanLimits::for_tier(SubscriptionTier::Enterprise);
        assert!(limits.allows(LimitedResource::Members, u32::MAX - 1));
        assert!(limits.allows(LimitedResource::Pages, 10_000));
    }

    #[test]
    fn test_allows_is_strict() {
        let limits = PlanLimits::for_tier(SubscriptionTier::Free);
        assert!(limits.allows(LimitedResource::Pages, 2));
        assert!(!limits.allows(LimitedResource::Pages, 3));
        assert!(!limits.allows(LimitedResource::Members, 100));
    }

    #[test]
    fn test_limit_error_display() {
        let err = PlanLimitError::LimitExceeded {
            resource: LimitedResource::Members,
            tier: SubscriptionTier::Free,
            limit: 100,
            current: 100,
        };
        assert_eq!(err.to_string(), "Member limit reached for the Free plan (100/100)");
    }
}
