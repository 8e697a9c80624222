/// Donations and donation funds
///
/// Amounts are integer cents. Only `COMPLETED` donations count toward totals;
/// pending, failed and refunded gifts stay on record but are excluded from
/// every summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::{non_blank, ListParams, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Check,
    Card,
    BankTransfer,
    Online,
    Other,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "donation_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl Default for DonationStatus {
    fn default() -> Self {
        DonationStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DonationFund {
    pub id: Uuid,
    pub church_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub goal_cents: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FundInput {
    #[validate(length(min = 1, max = 255, message = "Fund name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Goal must be positive"))]
    pub goal_cents: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Donation {
    pub id: Uuid,
    pub church_id: Uuid,
    pub member_id: Option<Uuid>,
    pub fund_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: DonationStatus,
    pub is_recurring: bool,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub donated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DonationInput {
    pub member_id: Option<Uuid>,
    pub fund_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount_cents: i64,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub status: DonationStatus,
    #[serde(default)]
    pub is_recurring: bool,
    #[validate(length(max = 255))]
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub donated_at: Option<DateTime<Utc>>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DonationFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub fund_id: Option<Uuid>,
    pub member_id: Option<Uuid>,
    pub status: Option<DonationStatus>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FundTotal {
    pub fund_id: Option<Uuid>,
    pub fund_name: Option<String>,
    pub total_cents: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MethodTotal {
    pub payment_method: PaymentMethod,
    pub total_cents: i64,
    pub count: i64,
}

/// Totals of completed donations in `[from, to)`
#[derive(Debug, Clone, Serialize)]
pub struct DonationSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_cents: i64,
    pub count: i64,
    pub by_fund: Vec<FundTotal>,
    pub by_method: Vec<MethodTotal>,
}

/// Why a donation write was refused
#[derive(Debug, thiserror::Error)]
pub enum DonationReferenceError {
    #[error("Member not found")]
    MemberNotFound,
    #[error("Fund not found")]
    FundNotFound,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl DonationFund {
    pub async fn create(pool: &PgPool, church_id: Uuid, data: FundInput) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, DonationFund>(
            r#"
            INSERT INTO donation_funds (church_id, name, description, goal_cents, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.name.trim())
        .bind(non_blank(data.description))
        .bind(data.goal_cents)
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    /// Returns the fund with this name, creating it if needed
    pub async fn ensure(pool: &PgPool, church_id: Uuid, data: FundInput) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, DonationFund>(
            r#"
            INSERT INTO donation_funds (church_id, name, description, goal_cents, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (church_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.name.trim())
        .bind(non_blank(data.description))
        .bind(data.goal_cents)
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, DonationFund>(
            "SELECT * FROM donation_funds WHERE church_id = $1 AND id = $2",
        )
        .bind(church_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(pool: &PgPool, church_id: Uuid, active_only: bool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, DonationFund>(
            r#"
            SELECT * FROM donation_funds
            WHERE church_id = $1 AND (is_active OR NOT $2)
            ORDER BY name ASC
            "#,
        )
        .bind(church_id)
        .bind(active_only)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        data: FundInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, DonationFund>(
            r#"
            UPDATE donation_funds
            SET name = $3, description = $4, goal_cents = $5, is_active = $6, updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.name.trim())
        .bind(non_blank(data.description))
        .bind(data.goal_cents)
        .bind(data.is_active)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM donation_funds WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl Donation {
    async fn check_references(
        pool: &PgPool,
        church_id: Uuid,
        data: &DonationInput,
    ) -> Result<(), DonationReferenceError> {
        if let Some(member_id) = data.member_id {
            if !super::member::Member::exists(pool, church_id, member_id).await? {
                return Err(DonationReferenceError::MemberNotFound);
            }
        }
        if let Some(fund_id) = data.fund_id {
            if DonationFund::find_by_id(pool, church_id, fund_id).await?.is_none() {
                return Err(DonationReferenceError::FundNotFound);
            }
        }
        Ok(())
    }

    /// Inserts a donation after checking the member and fund belong to `church_id`
    pub async fn create(
        pool: &PgPool,
        church_id: Uuid,
        data: DonationInput,
    ) -> Result<Self, DonationReferenceError> {
        Self::check_references(pool, church_id, &data).await?;

        let donation = sqlx::query_as::<_, Donation>(
            r#"
            INSERT INTO donations (
                church_id, member_id, fund_id, amount_cents, currency, payment_method,
                status, is_recurring, reference, notes, donated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, COALESCE($11, NOW()))
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.member_id)
        .bind(data.fund_id)
        .bind(data.amount_cents)
        .bind(data.currency.to_uppercase())
        .bind(data.payment_method)
        .bind(data.status)
        .bind(data.is_recurring)
        .bind(non_blank(data.reference))
        .bind(non_blank(data.notes))
        .bind(data.donated_at)
        .fetch_one(pool)
        .await?;

        Ok(donation)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Donation>("SELECT * FROM donations WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        church_id: Uuid,
        filter: &DonationFilter,
        params: ListParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        fn push_filters(
            builder: &mut QueryBuilder<'_, Postgres>,
            church_id: Uuid,
            filter: &DonationFilter,
        ) {
            builder.push(" WHERE church_id = ").push_bind(church_id);
            if let Some(from) = filter.from {
                builder.push(" AND donated_at >= ").push_bind(from);
            }
            if let Some(to) = filter.to {
                builder.push(" AND donated_at < ").push_bind(to);
            }
            if let Some(fund_id) = filter.fund_id {
                builder.push(" AND fund_id = ").push_bind(fund_id);
            }
            if let Some(member_id) = filter.member_id {
                builder.push(" AND member_id = ").push_bind(member_id);
            }
            if let Some(status) = filter.status {
                builder.push(" AND status = ").push_bind(status);
            }
        }

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM donations");
        push_filters(&mut count, church_id, filter);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM donations");
        push_filters(&mut select, church_id, filter);
        select
            .push(" ORDER BY donated_at DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let items = select.build_query_as::<Donation>().fetch_all(pool).await?;
        Ok(Page::new(items, total, params))
    }

    pub async fn update(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        data: DonationInput,
    ) -> Result<Option<Self>, DonationReferenceError> {
        Self::check_references(pool, church_id, &data).await?;

        let donation = sqlx::query_as::<_, Donation>(
            r#"
            UPDATE donations
            SET member_id = $3,
                fund_id = $4,
                amount_cents = $5,
                currency = $6,
                payment_method = $7,
                status = $8,
                is_recurring = $9,
                reference = $10,
                notes = $11,
                donated_at = COALESCE($12, donated_at),
                updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.member_id)
        .bind(data.fund_id)
        .bind(data.amount_cents)
        .bind(data.currency.to_uppercase())
        .bind(data.payment_method)
        .bind(data.status)
        .bind(data.is_recurring)
        .bind(non_blank(data.reference))
        .bind(non_blank(data.notes))
        .bind(data.donated_at)
        .fetch_optional(pool)
        .await?;

        Ok(donation)
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM donations WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sum and count of completed donations in `[from, to)`
    pub async fn completed_total(
        pool: &PgPool,
        church_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)::BIGINT, COUNT(*)
            FROM donations
            WHERE church_id = $1
              AND status = 'completed'
              AND donated_at >= $2 AND donated_at < $3
            "#,
        )
        .bind(church_id)
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await
    }

    pub async fn summary(
        pool: &PgPool,
        church_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<DonationSummary, sqlx::Error> {
        let (total_cents, count) = Self::completed_total(pool, church_id, from, to).await?;

        let by_fund = sqlx::query_as::<_, FundTotal>(
            r#"
            SELECT d.fund_id, f.name AS fund_name,
                   COALESCE(SUM(d.amount_cents), 0)::BIGINT AS total_cents,
                   COUNT(*) AS count
            FROM donations d
            LEFT JOIN donation_funds f ON f.id = d.fund_id AND f.church_id = d.church_id
            WHERE d.church_id = $1
              AND d.status = 'completed'
              AND d.donated_at >= $2 AND d.donated_at < $3
            GROUP BY d.fund_id, f.name
            ORDER BY total_cents DESC
            "#,
        )
        .bind(church_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

        let by_method = sqlx::query_as::<_, MethodTotal>(
            r#"
            SELECT payment_method,
                   COALESCE(SUM(amount_cents), 0)::BIGINT AS total_cents,
                   COUNT(*) AS count
            FROM donations
            WHERE church_id = $1
              AND status = 'completed'
              AND donated_at >= $2 AND donated_at < $3
            GROUP BY payment_method
            ORDER BY total_cents DESC
            "#,
        )
        .bind(church_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

        Ok(DonationSummary {
            from,
            to,
            total_cents,
            count,
            by_fund,
            by_method,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_donation_input_defaults() {
        let input: DonationInput =
            serde_json::from_value(serde_json::json!({ "amount_cents": 2500 })).unwrap();

        assert_eq!(input.currency, "USD");
        assert_eq!(input.payment_method, PaymentMethod::Cash);
        assert_eq!(input.status, DonationStatus::Completed);
        assert!(!input.is_recurring);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_donation_amount_must_be_positive() {
        let input: DonationInput =
            serde_json::from_value(serde_json::json!({ "amount_cents": 0 })).unwrap();
        assert!(input.validate().is_err());

        let input: DonationInput =
            serde_json::from_value(serde_json::json!({ "amount_cents": -100 })).unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_currency_must_be_three_letters() {
        let input: DonationInput = serde_json::from_value(
            serde_json::json!({ "amount_cents": 100, "currency": "DOLLARS" }),
        )
        .unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_payment_method_serde() {
        let method: PaymentMethod = serde_json::from_str("\"BANK_TRANSFER\"").unwrap();
        assert_eq!(method, PaymentMethod::BankTransfer);
    }
}
