/// API route handlers, one module per resource
///
/// Everything under `/api` except the auth endpoints needs a session. Module
/// routes additionally sit behind the module gate; `public` and `pwa` need
/// neither.

pub mod auth;
pub mod checkin;
pub mod church;
pub mod communications;
pub mod dashboard;
pub mod donations;
pub mod events;
pub mod families;
pub mod groups;
pub mod health;
pub mod members;
pub mod onboarding;
pub mod prayer_requests;
pub mod public;
pub mod pwa;
pub mod user;
pub mod volunteers;
pub mod website;
