//! Storage drivers
//!
//! The engine's only persistent stores are a TTL-capable key-value store
//! (sessions, revocations, reset tokens) and an append-only audit log, both
//! served by Redis.

mod redis;

pub use redis::RedisPool;
