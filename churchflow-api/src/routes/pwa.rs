/// Progressive web app assets
///
/// The service worker is generated from `churchflow_shared::offline` so the
/// sync tags, queue caches and replay endpoints cannot drift from the
/// handlers they target.

use axum::{
    http::{header, HeaderName, HeaderValue},
    response::{Html, IntoResponse},
    Json,
};
use churchflow_shared::offline::{render_service_worker, OFFLINE_PAGE};
use serde_json::{json, Value};

const SERVICE_WORKER_ALLOWED: HeaderName = HeaderName::from_static("service-worker-allowed");

const OFFLINE_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Offline | ChurchFlow</title>
  <style>
    body { font-family: system-ui, sans-serif; margin: 0; display: flex; min-height: 100vh;
           align-items: center; justify-content: center; background: #f8fafc; color: #0f172a; }
    main { max-width: 28rem; padding: 2rem; text-align: center; }
    button { margin-top: 1rem; padding: 0.5rem 1.25rem; border: 0; border-radius: 0.375rem;
             background: #4f46e5; color: #fff; font-size: 1rem; }
  </style>
</head>
<body>
  <main>
    <h1>You're offline</h1>
    <p>Check-ins and attendance you record now are saved on this device and
       sent automatically when the connection comes back.</p>
    <button onclick="location.reload()">Try again</button>
  </main>
</body>
</html>
"#;

/// `GET /sw.js`
pub async fn service_worker() -> impl IntoResponse {
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/javascript; charset=utf-8"),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (SERVICE_WORKER_ALLOWED, HeaderValue::from_static("/")),
        ],
        render_service_worker(),
    )
}

/// `GET /offline`
pub async fn offline_page() -> Html<&'static str> {
    Html(OFFLINE_HTML)
}

pub fn manifest_body() -> Value {
    json!({
        "name": "ChurchFlow",
        "short_name": "ChurchFlow",
        "description": "Church management: members, events, giving and more",
        "start_url": "/dashboard",
        "scope": "/",
        "display": "standalone",
        "background_color": "#ffffff",
        "theme_color": "#4f46e5",
        "icons": [
            { "src": "/icons/icon-192.png", "sizes": "192x192", "type": "image/png" },
            { "src": "/icons/icon-512.png", "sizes": "512x512", "type": "image/png", "purpose": "any maskable" }
        ],
        "offline_page": OFFLINE_PAGE,
    })
}

/// `GET /manifest.webmanifest`
pub async fn manifest() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/manifest+json"),
        )],
        Json(manifest_body()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_is_installable() {
        let manifest = manifest_body();
        assert_eq!(manifest["display"], "standalone");
        assert_eq!(manifest["start_url"], "/dashboard");
        assert!(manifest["icons"].as_array().is_some_and(|icons| icons.len() >= 2));
    }

    #[test]
    fn test_offline_page_mentions_sync() {
        assert!(OFFLINE_HTML.contains("sent automatically"));
    }
}
