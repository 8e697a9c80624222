/// Role checks for church-scoped handlers
///
/// Every church route resolves a [`ChurchContext`] first (signed in, church
/// selected, membership row present). Handlers then require the permission
/// their action needs:
///
/// | Permission | Minimum role | Typical use                          |
/// |------------|--------------|--------------------------------------|
/// | `Read`     | MEMBER       | listings, dashboards                 |
/// | `Record`   | VOLUNTEER    | check-in, attendance                 |
/// | `Write`    | STAFF        | members, events, giving, messages    |
/// | `Manage`   | ADMIN        | church settings, users, website      |
/// | `Own`      | OWNER        | subscription, deleting the church    |
///
/// # Example
///
/// ```no_run
/// use churchflow_shared::auth::authorization::{require_permission, ResourcePermission};
/// use churchflow_shared::auth::middleware::ChurchContext;
///
/// fn delete_member(ctx: &ChurchContext) -> Result<(), Box<dyn std::error::Error>> {
///     require_permission(ctx, ResourcePermission::Write)?;
///     Ok(())
/// }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::ChurchContext;
use crate::models::church_user::{ChurchRole, ChurchUser};

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Not a member of church {0}")]
    NotMember(Uuid),

    #[error("Insufficient permissions: requires {}, has {}", required.as_str(), actual.as_str())]
    InsufficientRole {
        required: ChurchRole,
        actual: ChurchRole,
    },

    /// Would leave the church without an owner
    #[error("A church must keep at least one owner")]
    LastOwner,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePermission {
    Read,
    Record,
    Write,
    Manage,
    Own,
}

impl ResourcePermission {
    pub fn min_role(&self) -> ChurchRole {
        match self {
            ResourcePermission::Read => ChurchRole::Member,
            ResourcePermission::Record => ChurchRole::Volunteer,
            ResourcePermission::Write => ChurchRole::Staff,
            ResourcePermission::Manage => ChurchRole::Admin,
            ResourcePermission::Own => ChurchRole::Owner,
        }
    }
}

/// Fails unless the context role is at least `required`
pub fn require_role(ctx: &ChurchContext, required: ChurchRole) -> Result<(), AuthzError> {
    if !ctx.role.has_permission(&required) {
        return Err(AuthzError::InsufficientRole {
            required,
            actual: ctx.role,
        });
    }
    Ok(())
}

pub fn require_permission(
    ctx: &ChurchContext,
    permission: ResourcePermission,
) -> Result<(), AuthzError> {
    require_role(ctx, permission.min_role())
}

/// Looks up the user's role in a church, failing when they are not a member
pub async fn require_membership(
    pool: &PgPool,
    church_id: Uuid,
    user_id: Uuid,
) -> Result<ChurchRole, AuthzError> {
    ChurchUser::get_role(pool, church_id, user_id)
        .await?
        .ok_or(AuthzError::NotMember(church_id))
}

/// Checks a role change for another user
///
/// Only owners may grant or revoke OWNER, and the last owner cannot be
/// demoted or removed.
pub async fn require_role_change(
    pool: &PgPool,
    ctx: &ChurchContext,
    target_user_id: Uuid,
    new_role: Option<ChurchRole>,
) -> Result<(), AuthzError> {
    require_permission(ctx, ResourcePermission::Manage)?;

    let current = require_membership(pool, ctx.church_id, target_user_id).await?;

    let touches_owner = current == ChurchRole::Owner || new_role == Some(ChurchRole::Owner);
    if touches_owner {
        require_role(ctx, ChurchRole::Owner)?;
    }

    if current == ChurchRole::Owner && new_role != Some(ChurchRole::Owner) {
        let owners = ChurchUser::count_owners(pool, ctx.church_id).await?;
        if owners <= 1 {
            return Err(AuthzError::LastOwner);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: ChurchRole) -> ChurchContext {
        ChurchContext {
            user_id: Uuid::new_v4(),
            church_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_permission_min_roles() {
        assert_eq!(ResourcePermission::Read.min_role(), ChurchRole::Member);
        assert_eq!(ResourcePermission::Record.min_role(), ChurchRole::Volunteer);
        assert_eq!(ResourcePermission::Write.min_role(), ChurchRole::Staff);
        assert_eq!(ResourcePermission::Manage.min_role(), ChurchRole::Admin);
        assert_eq!(ResourcePermission::Own.min_role(), ChurchRole::Owner);
    }

    #[test]
    fn test_require_permission_hierarchy() {
        assert!(require_permission(&ctx(ChurchRole::Owner), ResourcePermission::Own).is_ok());
        assert!(require_permission(&ctx(ChurchRole::Admin), ResourcePermission::Write).is_ok());
        assert!(require_permission(&ctx(ChurchRole::Volunteer), ResourcePermission::Record).is_ok());
        assert!(require_permission(&ctx(ChurchRole::Member), ResourcePermission::Read).is_ok());

        assert!(require_permission(&ctx(ChurchRole::Staff), ResourcePermission::Manage).is_err());
        assert!(require_permission(&ctx(ChurchRole::Member), ResourcePermission::Record).is_err());
    }

    #[test]
    fn test_insufficient_role_error() {
        let err = require_role(&ctx(ChurchRole::Volunteer), ChurchRole::Admin).unwrap_err();
        match err {
            AuthzError::InsufficientRole { required, actual } => {
                assert_eq!(required, ChurchRole::Admin);
                assert_eq!(actual, ChurchRole::Volunteer);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(
            require_role(&ctx(ChurchRole::Member), ChurchRole::Staff)
                .unwrap_err()
                .to_string(),
            "Insufficient permissions: requires STAFF, has MEMBER"
        );
    }
}
