/// Dashboard summary for one church

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::communication::Communication;
use super::donation::Donation;
use super::event::Event;
use super::member::Member;
use super::prayer_request::PrayerRequest;

pub const UPCOMING_EVENT_LIMIT: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub member_count: i64,
    pub upcoming_events: Vec<Event>,
    /// Completed donations since the first of the month (UTC)
    pub donations_this_month_cents: i64,
    pub donations_this_month_count: i64,
    pub pending_prayer_requests: i64,
    pub communications_sent: i64,
}

/// Midnight UTC on the first of `now`'s month
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

impl DashboardSummary {
    pub async fn load(pool: &PgPool, church_id: Uuid) -> Result<Self, sqlx::Error> {
        let now = Utc::now();

        let member_count = Member::count(pool, church_id).await?;
        let upcoming_events = Event::upcoming(pool, church_id, UPCOMING_EVENT_LIMIT, false).await?;
        let (donations_this_month_cents, donations_this_month_count) =
            Donation::completed_total(pool, church_id, month_start(now), now).await?;
        let pending_prayer_requests = PrayerRequest::count_pending(pool, church_id).await?;
        let communications_sent = Communication::stats(pool, church_id).await?.sent;

        Ok(Self {
            member_count,
            upcoming_events,
            donations_this_month_cents,
            donations_this_month_count,
            pending_prayer_requests,
            communications_sent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 14, 5, 9).unwrap();
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }
}
