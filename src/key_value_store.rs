use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use tokio::time::Instant;

/// Identifier of a single stream entry, ordered lexicographically by
/// (milliseconds, sequence) and rendered as `<ms>-<seq>` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    pub ms: u64,
    pub seq: u64,
}

impl EntryId {
    pub const MIN: EntryId = EntryId { ms: 0, seq: 0 };
    pub const MAX: EntryId = EntryId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for EntryId {
    type Err = String;

    /// Parses the literal `<ms>-<seq>` form. Wildcards and range shorthands
    /// are handled by the command layer, not here.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (ms_part, seq_part) = raw
            .split_once('-')
            .ok_or_else(|| "Invalid entry ID format".to_string())?;

        let ms = ms_part
            .parse::<u64>()
            .map_err(|_| "Invalid entry ID format".to_string())?;
        let seq = seq_part
            .parse::<u64>()
            .map_err(|_| "Invalid entry ID format".to_string())?;

        Ok(EntryId { ms, seq })
    }
}

/// One stream entry. Field order is preserved exactly as given to XADD
/// because it is observable through XRANGE and XREAD.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: EntryId,
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(String),
    List(VecDeque<String>),
    Stream(Vec<StreamEntry>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub data: DataType,
    pub expiration: Option<Instant>,
}

impl Value {
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expiration, Some(expiration) if now >= expiration)
    }
}

pub type KeyValueStore = HashMap<String, Value>;

/// Drops every expired entry. Called by the background expiry reaper; GET
/// additionally removes expired keys lazily on read.
pub fn remove_expired_keys(store: &mut KeyValueStore) {
    let now = Instant::now();
    store.retain(|_, value| !value.is_expired(now));
}
