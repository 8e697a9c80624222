//! Offline sync contract
//!
//! Check-in and attendance POSTs made without a connection are parked in a
//! named browser cache and replayed when a Background Sync event arrives.
//! This module is the single source of the cache names, sync tags and
//! endpoint paths, models the queue rules with [`SyncQueue`], and renders
//! the service worker script served at `/sw.js`.
//!
//! Queue rules:
//!
//! - entries replay in the order they were queued
//! - an entry is removed only after the server accepts it (2xx)
//! - a network failure stops the drain; the rest wait for the next sync
//! - a non-2xx answer keeps the entry and moves on to the next one

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static asset cache
pub const CACHE_NAME: &str = "churchflow-v1";

/// Navigation fallback when the network is gone
pub const OFFLINE_PAGE: &str = "/offline";

/// Fetched into [`CACHE_NAME`] on install
///
/// `cache.addAll` rejects on any non-2xx answer, so every entry must be a
/// route the API server itself answers with 200.
pub const PRECACHE_URLS: &[&str] = &[OFFLINE_PAGE, "/manifest.webmanifest"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTag {
    Checkins,
    Attendance,
}

impl SyncTag {
    pub const ALL: [SyncTag; 2] = [SyncTag::Checkins, SyncTag::Attendance];

    /// Background Sync tag
    pub fn tag(&self) -> &'static str {
        match self {
            SyncTag::Checkins => "sync-checkins",
            SyncTag::Attendance => "sync-attendance",
        }
    }

    /// Cache used as the queue
    pub fn cache_name(&self) -> &'static str {
        match self {
            SyncTag::Checkins => "offline-checkins",
            SyncTag::Attendance => "offline-attendance",
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            SyncTag::Checkins => "/api/checkin",
            SyncTag::Attendance => "/api/attendance",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn for_endpoint(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.endpoint() == path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// No connection; stop draining
    #[error("network unavailable: {0}")]
    Network(String),

    /// Server answered but did not accept the request
    #[error("server rejected replay with status {status}")]
    Rejected { status: u16 },

    #[error("{path} is not an offline-capable endpoint")]
    UnsupportedEndpoint { path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: u64,
    pub url: String,
    pub body: serde_json::Value,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub delivered: usize,
    pub rejected: usize,
    pub remaining: usize,
    /// True when a network failure cut the drain short
    pub interrupted: bool,
}

/// FIFO queue backing one sync tag
#[derive(Debug, Clone)]
pub struct SyncQueue {
    tag: SyncTag,
    entries: VecDeque<QueuedRequest>,
    next_id: u64,
}

impl SyncQueue {
    pub fn new(tag: SyncTag) -> Self {
        Self {
            tag,
            entries: VecDeque::new(),
            next_id: 1,
        }
    }

    pub fn tag(&self) -> SyncTag {
        self.tag
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &QueuedRequest> {
        self.entries.iter()
    }

    /// Parks a POST made while offline
    pub fn enqueue(&mut self, path: &str, body: serde_json::Value) -> Result<u64, SyncError> {
        if SyncTag::for_endpoint(path) != Some(self.tag) {
            return Err(SyncError::UnsupportedEndpoint {
                path: path.to_string(),
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(QueuedRequest {
            id,
            url: path.to_string(),
            body,
            queued_at: Utc::now(),
        });
        Ok(id)
    }

    /// Replays queued requests oldest first
    pub async fn drain<F, Fut>(&mut self, mut replay: F) -> DrainReport
    where
        F: FnMut(QueuedRequest) -> Fut,
        Fut: Future<Output = Result<(), SyncError>>,
    {
        let mut report = DrainReport::default();
        let mut kept = VecDeque::new();

        while let Some(entry) = self.entries.pop_front() {
            match replay(entry.clone()).await {
                Ok(()) => report.delivered += 1,
                Err(SyncError::Network(reason)) => {
                    tracing::debug!(tag = self.tag.tag(), %reason, "Sync interrupted");
                    kept.push_back(entry);
                    report.interrupted = true;
                    break;
                }
                Err(err) => {
                    tracing::warn!(tag = self.tag.tag(), id = entry.id, error = %err, "Replay not accepted");
                    report.rejected += 1;
                    kept.push_back(entry);
                }
            }
        }

        kept.append(&mut self.entries);
        self.entries = kept;
        report.remaining = self.entries.len();
        report
    }
}

/// Service worker script for `/sw.js`
pub fn render_service_worker() -> String {
    let precache = serde_json::to_string(PRECACHE_URLS).unwrap_or_else(|_| "[]".to_string());

    let mut queues = String::new();
    for tag in SyncTag::ALL {
        let _ = writeln!(
            queues,
            "  {{ tag: '{}', cache: '{}', endpoint: '{}' }},",
            tag.tag(),
            tag.cache_name(),
            tag.endpoint()
        );
    }

    format!(
        r#"const CACHE_NAME = '{cache}';
const OFFLINE_URL = '{offline}';
const PRECACHE_URLS = {precache};
const QUEUES = [
{queues}];

self.addEventListener('install', (event) => {{
  event.waitUntil(caches.open(CACHE_NAME).then((cache) => cache.addAll(PRECACHE_URLS)));
  self.skipWaiting();
}});

self.addEventListener('activate', (event) => {{
  const keep = [CACHE_NAME, ...QUEUES.map((q) => q.cache)];
  event.waitUntil(
    caches.keys().then((names) =>
      Promise.all(names.filter((n) => !keep.includes(n)).map((n) => caches.delete(n)))
    )
  );
  self.clients.claim();
}});

function queueFor(url) {{
  const path = new URL(url).pathname;
  return QUEUES.find((q) => q.endpoint === path);
}}

self.addEventListener('fetch', (event) => {{
  const request = event.request;

  if (request.method === 'POST') {{
    const queue = queueFor(request.url);
    if (!queue) return;
    event.respondWith(
      fetch(request.clone()).catch(async () => {{
        const cache = await caches.open(queue.cache);
        const body = await request.clone().text();
        const key = new Request(`${{request.url}}?queued=${{Date.now()}}-${{Math.random()}}`, {{ method: 'GET' }});
        await cache.put(key, new Response(body, {{ headers: {{ 'Content-Type': 'application/json' }} }}));
        await self.registration.sync.register(queue.tag);
        return new Response(JSON.stringify({{ queued: true }}), {{
          status: 202,
          headers: {{ 'Content-Type': 'application/json' }},
        }});
      }})
    );
    return;
  }}

  if (request.mode === 'navigate') {{
    event.respondWith(
      fetch(request)
        .then((response) => {{
          const copy = response.clone();
          caches.open(CACHE_NAME).then((cache) => cache.put(request, copy));
          return response;
        }})
        .catch(() => caches.match(request).then((hit) => hit || caches.match(OFFLINE_URL)))
    );
    return;
  }}

  event.respondWith(caches.match(request).then((hit) => hit || fetch(request)));
}});

async function drain(queue) {{
  const cache = await caches.open(queue.cache);
  const keys = await cache.keys();
  for (const key of keys) {{
    const stored = await cache.match(key);
    const body = await stored.text();
    // a rejected fetch ends the drain; the browser retries the sync later
    const response = await fetch(queue.endpoint, {{
      method: 'POST',
      credentials: 'include',
      headers: {{ 'Content-Type': 'application/json' }},
      body,
    }});
    if (response.ok) {{
      await cache.delete(key);
    }}
  }}
}}

self.addEventListener('sync', (event) => {{
  const queue = QUEUES.find((q) => q.tag === event.tag);
  if (queue) {{
    event.waitUntil(drain(queue));
  }}
}});
"#,
        cache = CACHE_NAME,
        offline = OFFLINE_PAGE,
        precache = precache,
        queues = queues,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn checkin(n: u32) -> serde_json::Value {
        json!({ "event_id": "e", "member_id": format!("m{}", n) })
    }

    #[test]
    fn test_tag_contract() {
        assert_eq!(SyncTag::Checkins.tag(), "sync-checkins");
        assert_eq!(SyncTag::Checkins.cache_name(), "offline-checkins");
        assert_eq!(SyncTag::Attendance.tag(), "sync-attendance");
        assert_eq!(SyncTag::Attendance.cache_name(), "offline-attendance");
        assert_eq!(SyncTag::from_tag("sync-attendance"), Some(SyncTag::Attendance));
        assert_eq!(SyncTag::for_endpoint("/api/checkin"), Some(SyncTag::Checkins));
        assert_eq!(SyncTag::from_tag("sync-donations"), None);
    }

    #[test]
    fn test_enqueue_rejects_other_endpoints() {
        let mut queue = SyncQueue::new(SyncTag::Checkins);
        assert!(queue.enqueue("/api/attendance", json!({})).is_err());
        assert!(queue.enqueue("/api/donations", json!({})).is_err());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_offline_checkin_removed_only_after_success() {
        let mut queue = SyncQueue::new(SyncTag::Checkins);
        queue.enqueue("/api/checkin", checkin(1)).unwrap();
        assert_eq!(queue.len(), 1);

        let report = queue
            .drain(|_| async { Err(SyncError::Network("offline".to_string())) })
            .await;
        assert!(report.interrupted);
        assert_eq!(queue.len(), 1);

        let report = queue.drain(|_| async { Ok(()) }).await;
        assert_eq!(report.delivered, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_drain_is_fifo() {
        let mut queue = SyncQueue::new(SyncTag::Checkins);
        for n in 1..=3 {
            queue.enqueue("/api/checkin", checkin(n)).unwrap();
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        queue
            .drain(move |entry| {
                sink.lock().unwrap().push(entry.id);
                async { Ok(()) }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_network_failure_stops_drain_and_keeps_order() {
        let mut queue = SyncQueue::new(SyncTag::Attendance);
        for n in 1..=3 {
            queue.enqueue("/api/attendance", checkin(n)).unwrap();
        }

        let report = queue
            .drain(|entry| async move {
                if entry.id == 2 {
                    Err(SyncError::Network("dropped".to_string()))
                } else {
                    Ok(())
                }
            })
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.remaining, 2);
        let ids: Vec<u64> = queue.pending().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_rejected_entry_kept_and_drain_continues() {
        let mut queue = SyncQueue::new(SyncTag::Checkins);
        for n in 1..=3 {
            queue.enqueue("/api/checkin", checkin(n)).unwrap();
        }

        let report = queue
            .drain(|entry| async move {
                if entry.id == 1 {
                    Err(SyncError::Rejected { status: 422 })
                } else {
                    Ok(())
                }
            })
            .await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.rejected, 1);
        assert!(!report.interrupted);
        let ids: Vec<u64> = queue.pending().map(|e| e.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_service_worker_uses_contract() {
        let script = render_service_worker();
        assert!(script.contains("const CACHE_NAME = 'churchflow-v1';"));
        assert!(script.contains("const OFFLINE_URL = '/offline';"));
        for tag in SyncTag::ALL {
            assert!(script.contains(tag.tag()));
            assert!(script.contains(tag.cache_name()));
            assert!(script.contains(tag.endpoint()));
        }
        assert!(script.contains("\"/manifest.webmanifest\""));
    }
}
