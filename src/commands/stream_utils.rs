use crate::key_value_store::{EntryId, StreamEntry};
use crate::resp::RespValue;

/// An XADD entry ID argument after parsing: fully auto-generated, a fixed
/// millisecond part with an auto-generated sequence, or an explicit ID.
#[derive(Debug, PartialEq)]
pub enum EntryIdSpec {
    Wildcard,
    SequenceWildcard(u64),
    Literal(EntryId),
}

/// Parses the entry ID argument of XADD: `*`, `<ms>-*` or `<ms>-<seq>`.
pub fn parse_entry_id(raw: &str) -> Result<EntryIdSpec, String> {
    if raw == "*" {
        return Ok(EntryIdSpec::Wildcard);
    }

    let (ms_part, seq_part) = raw
        .split_once('-')
        .ok_or_else(|| "Invalid entry ID format".to_string())?;

    let ms = ms_part
        .parse::<u64>()
        .map_err(|_| "Invalid entry ID format".to_string())?;

    if seq_part == "*" {
        return Ok(EntryIdSpec::SequenceWildcard(ms));
    }

    raw.parse::<EntryId>().map(EntryIdSpec::Literal)
}

/// Parses a range ID as used by XRANGE and XREAD: `-` is the minimum ID,
/// `+` the maximum, a lone `<ms>` is shorthand for `<ms>-0`, and
/// `<ms>-<seq>` is taken literally. `$` is not accepted here; callers
/// resolve it against the stream tail before comparisons.
pub fn parse_range_id(raw: &str) -> Result<EntryId, String> {
    match raw {
        "-" => Ok(EntryId::MIN),
        "+" => Ok(EntryId::MAX),
        _ => {
            if raw.contains('-') {
                raw.parse::<EntryId>()
            } else {
                let ms = raw
                    .parse::<u64>()
                    .map_err(|_| "Invalid stream ID format".to_string())?;
                Ok(EntryId::new(ms, 0))
            }
        }
    }
}

/// Renders one entry as the 2-element array `[id, [f1, v1, f2, v2, ...]]`,
/// keeping field insertion order.
pub fn encode_entry(entry: &StreamEntry) -> RespValue {
    let mut flat_fields = Vec::with_capacity(entry.fields.len() * 2);

    for (name, value) in &entry.fields {
        flat_fields.push(RespValue::BulkString(name.clone()));
        flat_fields.push(RespValue::BulkString(value.clone()));
    }

    RespValue::Array(vec![
        RespValue::BulkString(entry.id.to_string()),
        RespValue::Array(flat_fields),
    ])
}

pub fn encode_entries(entries: &[StreamEntry]) -> RespValue {
    RespValue::Array(entries.iter().map(encode_entry).collect())
}

/// Renders the per-stream element of an XREAD reply: `[key, [entry, ...]]`.
pub fn encode_stream_block(key: &str, entries: &[StreamEntry]) -> RespValue {
    RespValue::Array(vec![
        RespValue::BulkString(key.to_string()),
        encode_entries(entries),
    ])
}
