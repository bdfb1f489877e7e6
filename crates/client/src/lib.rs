//! Client application core for the TaskForge API.
//!
//! - [`ApiClient`]: typed REST calls with a fixed request timeout
//! - [`Session`]: the signed-in user and the headers every call carries
//! - [`NotificationMirror`]: local copy of the user's notifications, fed by
//!   REST snapshots and realtime pushes
//! - [`RoomTracker`]: the rooms to (re)join on every socket connect

pub mod api;
pub mod mirror;
pub mod rooms;
pub mod session;

pub use api::{ApiClient, ClientError, NotificationPage, Pagination};
pub use mirror::NotificationMirror;
pub use rooms::RoomTracker;
pub use session::Session;
