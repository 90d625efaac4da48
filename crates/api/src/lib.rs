//! Pushgate HTTP surface.
//!
//! - `POST /push`: database webhook fired when a notification row is inserted
//! - `POST|GET|DELETE /api/users/v1/fcmToken`: device-token registration
//! - `GET /health`

pub mod middleware;
pub mod routes;
pub mod state;
