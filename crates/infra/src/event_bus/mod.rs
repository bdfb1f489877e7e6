//! Infrastructure backplane implementations.
//!
//! The backplane abstraction lives in `taskforge-events`; this module adds the
//! Redis-backed transport used when several API instances run side by side.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::RedisBackplane;
