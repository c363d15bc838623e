//! Deterministic identity derivation and audit hashing.
//!
//! Canonical-JSON SHA-256 audit chain and a `cycle_{start_date}` id scheme,
//! built on `sha2`/`hex`.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// `signal_id = sha256(source|symbol|transaction_date|filer)`, hex-encoded.
///
/// Identity is derived from source + symbol + transaction_date + filer.
pub fn derive_signal_id(
    source: &str,
    symbol: &str,
    transaction_date: DateTime<Utc>,
    filer: &str,
) -> String {
    let joined = format!(
        "{}|{}|{}|{}",
        source,
        symbol,
        transaction_date.to_rfc3339(),
        filer
    );
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

/// `cycle_{start_date:%Y%m%d_%H%M%S}`.
pub fn derive_cycle_id(start_date: DateTime<Utc>) -> String {
    format!("cycle_{}", start_date.format("%Y%m%d_%H%M%S"))
}

/// SHA-256 hex digest of the canonical audit event payload.
///
/// Canonicalization: a JSON object with keys sorted lexicographically.
/// `serde_json` serializes maps in insertion order, so the caller is expected to pass a
/// `serde_json::Value` built from a `BTreeMap` (or a `#[derive(Serialize)]`
/// struct field order that is already alphabetical) — `canonical_event_hash`
/// re-sorts top-level object keys defensively before hashing.
pub fn canonical_event_hash(
    timestamp: DateTime<Utc>,
    event_type: &str,
    entity_id: &str,
    after_state: &serde_json::Value,
) -> String {
    let mut map = std::collections::BTreeMap::new();
    map.insert("timestamp", serde_json::Value::String(timestamp.to_rfc3339()));
    map.insert("event_type", serde_json::Value::String(event_type.to_string()));
    map.insert("entity_id", serde_json::Value::String(entity_id.to_string()));
    map.insert("after_state", after_state.clone());

    let canonical = serde_json::to_string(&map).expect("map of values always serializes");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// A new random order id (`uuid` v4).
pub fn new_order_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A new random position id.
pub fn new_position_id() -> String {
    format!("pos_{}", uuid::Uuid::new_v4())
}

/// A new random audit event id.
pub fn new_event_id() -> String {
    format!("evt_{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn signal_id_is_deterministic() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let a = derive_signal_id("CONGRESSIONAL", "AAPL", ts, "Jane Doe");
        let b = derive_signal_id("CONGRESSIONAL", "AAPL", ts, "Jane Doe");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn signal_id_distinguishes_fields() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let a = derive_signal_id("CONGRESSIONAL", "AAPL", ts, "Jane Doe");
        let b = derive_signal_id("CONGRESSIONAL", "MSFT", ts, "Jane Doe");
        assert_ne!(a, b);
    }

    #[test]
    fn cycle_id_format() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(derive_cycle_id(ts), "cycle_20260301_093000");
    }

    #[test]
    fn event_hash_changes_with_after_state() {
        let ts = Utc::now();
        let a = canonical_event_hash(ts, "SIGNAL_ACTIVATED", "sig1", &serde_json::json!({"status": "ACTIVE"}));
        let b = canonical_event_hash(ts, "SIGNAL_ACTIVATED", "sig1", &serde_json::json!({"status": "REJECTED"}));
        assert_ne!(a, b);
    }
}
