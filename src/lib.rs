//! An in-memory key/value server speaking a subset of RESP.
//!
//! This crate provides a Redis-compatible server implementation that supports
//! core Redis functionality including:
//!
//! - Basic key-value operations (GET, SET, INCR) with millisecond TTLs
//! - List operations (LPUSH, RPUSH, LPOP, BLPOP, LRANGE, LLEN)
//! - Stream operations (XADD, XRANGE, XREAD) with blocking reads
//! - Per-connection transactions (MULTI, EXEC, DISCARD)
//! - Point-in-time snapshots (SAVE, BGSAVE) to a binary dump file
//!
//! The server uses the Redis Serialization Protocol (RESP) for client
//! communication and supports concurrent connections through async/await with
//! Tokio. Clients blocked on BLPOP or XREAD BLOCK are woken through
//! per-connection reply channels by the producers that feed them, or by a
//! timeout reaper task.

pub mod commands;
pub mod connection;
pub mod input;
pub mod key_value_store;
pub mod rdb;
pub mod resp;
pub mod server;
pub mod state;
