/// Database models
///
/// One module per table family. Every row type that belongs to a church takes
/// `church_id` as a required argument on every query, including `UPDATE` and
/// `DELETE`, so a handler can never reach another church's rows by id alone.
///
/// # Models
///
/// - `church`, `user`, `church_user`: tenancy and accounts
/// - `member`, `family`, `group`: people
/// - `event`, `check_in`, `attendance`: gatherings
/// - `donation`: funds and gifts
/// - `volunteer`: roles, assignments, shifts
/// - `communication`: outbound messages and templates
/// - `prayer_request`
/// - `dashboard`: summary counts across modules
/// - `web_page`, `media_file`: website builder
///
/// # Example
///
/// ```no_run
/// use churchflow_shared::models::member::{Member, MemberFilter};
/// use churchflow_shared::models::ListParams;
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
///
/// # async fn example(pool: PgPool, church_id: Uuid) -> Result<(), sqlx::Error> {
/// let page = Member::list(&pool, church_id, &MemberFilter::default(), ListParams::default()).await?;
/// println!("{} of {} members", page.items.len(), page.total);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};

pub mod attendance;
pub mod check_in;
pub mod church;
pub mod church_user;
pub mod communication;
pub mod dashboard;
pub mod donation;
pub mod event;
pub mod family;
pub mod group;
pub mod media_file;
pub mod member;
pub mod prayer_request;
pub mod user;
pub mod volunteer;
pub mod web_page;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: i64 = 200;

/// `?page=&per_page=` query parameters
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl ListParams {
    /// `LIMIT` value, clamped to `1..=MAX_PAGE_SIZE`
    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, MAX_PAGE_SIZE)
    }

    /// `OFFSET` value for the (1-based) page
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }
}

/// One page of results plus the unpaged total
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page.max(1),
            per_page: params.limit(),
        }
    }
}

/// Trims `value` and maps blank strings to `None`
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lowercased, trimmed email; blank becomes `None`
pub fn normalize_email(email: Option<String>) -> Option<String> {
    non_blank(email).map(|e| e.to_lowercase())
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards escaped
pub fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern(" smith "), "%smith%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_list_params_defaults() {
        let params = ListParams::default();
        assert_eq!(params.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_list_params_clamps() {
        let params = ListParams { page: 0, per_page: 10_000 };
        assert_eq!(params.limit(), MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 0);

        let params = ListParams { page: 3, per_page: 20 };
        assert_eq!(params.offset(), 40);

        let params = ListParams { page: 2, per_page: -5 };
        assert_eq!(params.limit(), 1);
        assert_eq!(params.offset(), 1);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email(Some("  Pastor@Example.ORG ".into())),
            Some("pastor@example.org".into())
        );
        assert_eq!(normalize_email(Some("   ".into())), None);
        assert_eq!(normalize_email(None), None);
    }
}
